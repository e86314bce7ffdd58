//! Prelude module - commonly used types for convenient import.
//!
//! Use `use palisade_core::prelude::*;` to import all essential types.

// Identifiers & time
pub use crate::{CallerId, JobId, RequestId, Timestamp};

// Classification
pub use crate::{Decision, RiskLevel};

// Requests
pub use crate::{ActionRequest, NetworkRequest, ToolCall};

// SSRF classification
pub use crate::is_public_ip;
