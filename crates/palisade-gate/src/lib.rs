//! Palisade Gate - the tool-call validation gate.
//!
//! Every tool invocation an agent attempts passes through
//! [`ToolCallGate::validate`] before execution. The gate enforces an
//! explicit allow-list (unknown tools are forbidden, not permitted),
//! sanitizes every supplied parameter against its declared schema, and
//! routes approval-gated calls into the approval workflow. Every
//! decision, on every branch, lands in the audit log.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod gate;
pub mod sanitize;

pub use gate::{ToolCallGate, ValidationResult};
pub use sanitize::sanitize_parameter;
