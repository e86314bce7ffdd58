//! Palisade Core - Foundation types for the Palisade action policy gateway.
//!
//! This crate provides:
//! - Newtype identifiers (`RequestId`, `CallerId`, `JobId`)
//! - The [`ActionRequest`] union consumed by both gates
//! - Decision and risk classification types shared by gates and audit
//! - IP-level SSRF classification (`is_public_ip`)

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod net;
pub mod prelude;
pub mod request;
pub mod types;

pub use net::is_public_ip;
pub use request::{ActionRequest, NetworkRequest, ToolCall};
pub use types::{CallerId, Decision, JobId, RequestId, RiskLevel, Timestamp};
