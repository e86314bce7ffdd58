//! Palisade Approval - human-in-the-loop approval workflow.
//!
//! Requests for approval-gated tool calls park in a pending table and
//! resolve to exactly one terminal state: approved by an operator,
//! rejected by an operator, or timed out by the TTL sweep. Auto-approved
//! calls skip the pending table and land straight in history.
//!
//! # State machine
//!
//! ```text
//! (submission) --auto--> AutoApproved
//! (submission) --------> PendingApproval --approve--> ManuallyApproved
//!                                        --reject---> Rejected
//!                                        --sweep----> TimedOut
//! ```
//!
//! All four right-hand states are terminal. History is append-only and
//! never mutated; a request ID is in at most one of {pending, history}.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod request;
pub mod workflow;

pub use error::{ApprovalError, ApprovalResult};
pub use request::{ApprovalRecord, ApprovalRequest, ApprovalStatus};
pub use workflow::{ApprovalState, ApprovalWorkflow, WorkflowStats};
