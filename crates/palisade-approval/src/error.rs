//! Approval workflow error types.

use palisade_core::RequestId;
use thiserror::Error;

/// Errors that can occur when submitting to the approval workflow.
#[derive(Debug, Error)]
pub enum ApprovalError {
    /// The request ID is already pending or already resolved.
    #[error("request {0} was already submitted")]
    DuplicateRequest(RequestId),

    /// The pending table is at its configured limit.
    #[error("pending queue full ({limit} requests)")]
    QueueFull {
        /// Configured `max_pending`.
        limit: usize,
    },
}

/// Result type for approval operations.
pub type ApprovalResult<T> = Result<T, ApprovalError>;
