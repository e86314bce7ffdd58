//! Audit entry type.

use palisade_core::{CallerId, Decision, RequestId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recorded gate decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the decision was made.
    pub timestamp: Timestamp,
    /// The request being decided.
    pub request_id: RequestId,
    /// The decision reached.
    pub decision: Decision,
    /// Specific, enumerable reason for rejections; `None` for allows.
    pub reason: Option<String>,
    /// Who asked.
    pub caller_id: CallerId,
    /// Time spent deciding (and, for executed requests, transferring).
    pub latency_ms: u64,
    /// Response bytes transferred, for executed network requests.
    pub bytes: Option<u64>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    #[must_use]
    pub fn new(request_id: RequestId, caller_id: CallerId, decision: Decision) -> Self {
        Self {
            timestamp: Timestamp::now(),
            request_id,
            decision,
            reason: None,
            caller_id,
            latency_ms: 0,
            bytes: None,
        }
    }

    /// Attach a rejection reason.
    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Record decision latency.
    #[must_use]
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Record transferred bytes.
    #[must_use]
    pub fn with_bytes(mut self, bytes: u64) -> Self {
        self.bytes = Some(bytes);
        self
    }
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.timestamp, self.request_id, self.caller_id, self.decision
        )?;
        if let Some(reason) = &self.reason {
            write!(f, " ({reason})")?;
        }
        Ok(())
    }
}
