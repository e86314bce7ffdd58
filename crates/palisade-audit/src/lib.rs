//! Palisade Audit - bounded in-memory audit log for gate decisions.
//!
//! Every decision from the tool-call gate and the egress guard lands
//! here: a fixed-capacity ring buffer where the oldest entries are
//! overwritten, never individually deleted. An optional [`AuditSink`]
//! lets a logging/metrics collaborator persist or export entries; the
//! core owns no file format or listener itself.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod entry;
pub mod log;

pub use entry::AuditEntry;
pub use log::{AuditLog, AuditSink, DEFAULT_CAPACITY};
