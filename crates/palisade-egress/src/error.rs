//! Egress error taxonomy.
//!
//! The split matters to callers: a [`EgressError::Denied`] means the
//! request itself is wrong and retrying is pointless, a
//! [`EgressError::RateLimited`] is retryable later, and a
//! [`EgressError::Transport`] failed despite being allowed. Nothing is
//! retried internally; retry policy belongs to the caller.

use palisade_core::CallerId;
use thiserror::Error;

/// Errors produced by the network egress guard.
#[derive(Debug, Error)]
pub enum EgressError {
    /// Blocked by policy. Terminal: the request must change, not retry.
    #[error("request denied: {reason}")]
    Denied {
        /// Specific, enumerable reason for the denial.
        reason: String,
    },

    /// Over the caller's egress budget. Retryable after a backoff.
    #[error("rate limit exceeded for {caller}")]
    RateLimited {
        /// The caller whose bucket is empty.
        caller: CallerId,
    },

    /// The URL could not be parsed at all.
    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The transfer failed despite being allowed (DNS, connect,
    /// timeout, mid-stream error).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Response body exceeded the policy size cap.
    #[error("content exceeded size limit of {limit} bytes")]
    BodyTooLarge {
        /// The policy's `max_size_bytes`.
        limit: u64,
    },
}

impl EgressError {
    /// Whether this outcome was a policy decision rather than a
    /// transport failure.
    #[must_use]
    pub fn is_policy_denial(&self) -> bool {
        matches!(self, Self::Denied { .. } | Self::InvalidUrl(_))
    }

    /// Whether the caller may reasonably retry later without changing
    /// the request.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Transport(_))
    }
}

/// Convenience alias for egress operations.
pub type EgressResult<T> = Result<T, EgressError>;
