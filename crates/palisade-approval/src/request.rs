//! Approval request and record types.

use palisade_core::{CallerId, JobId, RequestId, RiskLevel, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// A request awaiting human approval.
///
/// Created by the tool-call gate when a category policy marks the tool
/// approval-required and sanitization produced no violations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    /// Unique request identifier, shared with the original tool call.
    pub id: RequestId,
    /// What is being approved (tool name or URL).
    pub subject: String,
    /// Who asked.
    pub caller_id: CallerId,
    /// Background job the request belongs to, if any.
    #[serde(default)]
    pub job_id: Option<JobId>,
    /// Sanitized parameters, for the operator's review.
    #[serde(default)]
    pub parameters: BTreeMap<String, Value>,
    /// Risk classification of the tool's category.
    pub risk_level: RiskLevel,
    /// When the request was submitted.
    pub created_at: Timestamp,
}

impl ApprovalRequest {
    /// Create a request stamped with the current time.
    #[must_use]
    pub fn new(
        id: RequestId,
        subject: impl Into<String>,
        caller_id: CallerId,
        risk_level: RiskLevel,
    ) -> Self {
        Self {
            id,
            subject: subject.into(),
            caller_id,
            job_id: None,
            parameters: BTreeMap::new(),
            risk_level,
            created_at: Timestamp::now(),
        }
    }

    /// Attach the sanitized parameters.
    #[must_use]
    pub fn with_parameters(mut self, parameters: BTreeMap<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Attach a job ID.
    #[must_use]
    pub fn with_job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }
}

impl fmt::Display for ApprovalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} - {}",
            self.risk_level, self.id, self.caller_id, self.subject
        )
    }
}

/// Terminal status of a resolved approval request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    /// Allowed at submission time without passing through pending.
    AutoApproved,
    /// Approved by an operator.
    ManuallyApproved,
    /// Rejected by an operator.
    Rejected,
    /// Expired out of the pending table by the TTL sweep.
    TimedOut,
}

impl ApprovalStatus {
    /// Check if this status permits the action.
    #[must_use]
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::AutoApproved | Self::ManuallyApproved)
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AutoApproved => write!(f, "auto_approved"),
            Self::ManuallyApproved => write!(f, "manually_approved"),
            Self::Rejected => write!(f, "rejected"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// Immutable record of a resolved approval request.
///
/// Appended to the workflow's history exactly once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRecord {
    /// The resolved request.
    pub id: RequestId,
    /// What was approved or rejected.
    pub subject: String,
    /// Who asked.
    pub caller_id: CallerId,
    /// Risk classification carried over from the request.
    pub risk_level: RiskLevel,
    /// How the request resolved.
    pub status: ApprovalStatus,
    /// Operator who decided, for manual resolutions.
    pub decided_by: Option<String>,
    /// Free-form resolution notes (e.g. a rejection reason).
    pub notes: Option<String>,
    /// When the request resolved.
    pub decided_at: Timestamp,
}

impl ApprovalRecord {
    /// Build the terminal record for a request.
    #[must_use]
    pub fn resolve(request: &ApprovalRequest, status: ApprovalStatus) -> Self {
        Self {
            id: request.id,
            subject: request.subject.clone(),
            caller_id: request.caller_id.clone(),
            risk_level: request.risk_level,
            status,
            decided_by: None,
            notes: None,
            decided_at: Timestamp::now(),
        }
    }

    /// Attach the deciding operator.
    #[must_use]
    pub fn decided_by(mut self, approver: impl Into<String>) -> Self {
        self.decided_by = Some(approver.into());
        self
    }

    /// Attach resolution notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}
