//! Palisade Egress - the outbound network guard.
//!
//! Agents never hold a raw HTTP client; every outbound request goes
//! through [`NetworkEgressGuard`]. The guard checks the URL against the
//! policy's scheme and domain lists, applies built-in SSRF defenses
//! that no allow-list entry can override, rate-limits per caller, and
//! enforces the response size cap while streaming so a server that
//! omits or lies about `Content-Length` cannot slip an oversized body
//! through.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod error;
pub mod guard;
mod validate;

pub use error::{EgressError, EgressResult};
pub use guard::{EgressResponse, NetworkEgressGuard};
