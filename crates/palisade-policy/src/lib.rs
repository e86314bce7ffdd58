//! Palisade Policy - the declarative policy document consumed by both gates.
//!
//! A collaborator (the agent runtime's config loader) deserializes a policy
//! document into [`GatewayPolicy`] and calls [`validate`] exactly once;
//! after that the policy is immutable and shared read-only. Malformed
//! documents are rejected eagerly at load time rather than failing
//! per-request.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod types;
pub mod validate;

pub use error::{PolicyError, PolicyResult};
pub use types::{
    ApprovalSettings, CategoryPolicy, GatewayPolicy, NetworkPolicy, ParamKind, ParameterSchema,
    RateLimitSettings, SanitizeSettings, ToolPolicy,
};
pub use validate::validate;
