//! The approval workflow store and its operations.

use palisade_core::{RequestId, RiskLevel, Timestamp};
use palisade_policy::ApprovalSettings;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ApprovalError, ApprovalResult};
use crate::request::{ApprovalRecord, ApprovalRequest, ApprovalStatus};

/// Mutable workflow state, guarded as a single mutual-exclusion domain.
///
/// Every operation that touches `pending` or `history` holds the lock for
/// its whole critical section, so a request racing between `approve` and
/// `sweep_expired` resolves to exactly one terminal record: whichever
/// writer observes the entry still pending wins, the loser reports
/// `false`/0.
#[derive(Debug, Default)]
struct WorkflowState {
    pending: HashMap<RequestId, ApprovalRequest>,
    history: Vec<ApprovalRecord>,
    /// IDs ever resolved; duplicate-submission guard without scanning history.
    resolved: HashSet<RequestId>,
}

/// Current position of a request in the workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ApprovalState {
    /// Still awaiting an operator or the TTL sweep.
    Pending {
        /// The pending request.
        request: ApprovalRequest,
    },
    /// Resolved to a terminal status.
    Resolved {
        /// The immutable terminal record.
        record: ApprovalRecord,
    },
}

/// Aggregate workflow statistics for the operator surface.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStats {
    /// Requests ever seen (pending + resolved).
    pub total: usize,
    /// Currently pending requests.
    pub pending: usize,
    /// Resolved requests grouped by terminal status.
    pub by_status: BTreeMap<ApprovalStatus, usize>,
    /// Requests (pending and resolved) grouped by risk level.
    pub by_risk: BTreeMap<RiskLevel, usize>,
}

/// The approval workflow: pending table, append-only history, TTL sweep.
#[derive(Debug)]
pub struct ApprovalWorkflow {
    state: Mutex<WorkflowState>,
    timeout: Duration,
    max_pending: usize,
}

impl ApprovalWorkflow {
    /// Create a workflow from policy settings.
    #[must_use]
    pub fn new(settings: &ApprovalSettings) -> Self {
        Self::with_limits(
            Duration::from_secs(settings.timeout_secs),
            settings.max_pending,
        )
    }

    /// Create a workflow with explicit limits.
    #[must_use]
    pub fn with_limits(timeout: Duration, max_pending: usize) -> Self {
        Self {
            state: Mutex::new(WorkflowState::default()),
            timeout,
            max_pending: max_pending.max(1),
        }
    }

    /// Park a request in the pending table.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::DuplicateRequest`] if the ID was already
    /// submitted, or [`ApprovalError::QueueFull`] if the pending table is
    /// at its limit.
    pub fn submit(&self, request: ApprovalRequest) -> ApprovalResult<RequestId> {
        let mut state = self.lock_state();
        Self::check_unseen(&state, &request.id)?;
        if state.pending.len() >= self.max_pending {
            return Err(ApprovalError::QueueFull {
                limit: self.max_pending,
            });
        }
        let id = request.id;
        tracing::info!(%id, subject = %request.subject, "approval request pending");
        state.pending.insert(id, request);
        Ok(id)
    }

    /// Record an auto-approval, bypassing the pending table entirely.
    ///
    /// # Errors
    ///
    /// Returns [`ApprovalError::DuplicateRequest`] if the ID was already
    /// submitted.
    pub fn record_auto_approval(&self, request: &ApprovalRequest) -> ApprovalResult<RequestId> {
        let mut state = self.lock_state();
        Self::check_unseen(&state, &request.id)?;
        let record = ApprovalRecord::resolve(request, ApprovalStatus::AutoApproved);
        let id = record.id;
        state.resolved.insert(id);
        state.history.push(record);
        Ok(id)
    }

    /// Approve a pending request.
    ///
    /// Returns `false` if the request is not pending (unknown, or already
    /// resolved by another writer) — approval is not reentrant.
    pub fn approve(&self, id: &RequestId, approver: &str) -> bool {
        self.resolve(id, |request| {
            ApprovalRecord::resolve(request, ApprovalStatus::ManuallyApproved).decided_by(approver)
        })
    }

    /// Reject a pending request.
    ///
    /// Symmetric to [`approve`](Self::approve).
    pub fn reject(&self, id: &RequestId, approver: &str, reason: &str) -> bool {
        self.resolve(id, |request| {
            ApprovalRecord::resolve(request, ApprovalStatus::Rejected)
                .decided_by(approver)
                .with_notes(reason)
        })
    }

    /// Move every pending entry older than the TTL to history as
    /// `TimedOut`. Returns the number of entries moved.
    pub fn sweep_expired(&self, now: Timestamp) -> usize {
        let mut state = self.lock_state();
        let expired: Vec<RequestId> = state
            .pending
            .iter()
            .filter(|(_, request)| {
                now.0
                    .signed_duration_since(request.created_at.0)
                    .to_std()
                    .is_ok_and(|elapsed| elapsed > self.timeout)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            if let Some(request) = state.pending.remove(id) {
                tracing::info!(%id, subject = %request.subject, "approval request timed out");
                let record = ApprovalRecord::resolve(&request, ApprovalStatus::TimedOut);
                state.resolved.insert(*id);
                state.history.push(record);
            }
        }
        expired.len()
    }

    /// Where a request currently sits, if known.
    #[must_use]
    pub fn status(&self, id: &RequestId) -> Option<ApprovalState> {
        let state = self.lock_state();
        if let Some(request) = state.pending.get(id) {
            return Some(ApprovalState::Pending {
                request: request.clone(),
            });
        }
        state
            .history
            .iter()
            .find(|record| &record.id == id)
            .map(|record| ApprovalState::Resolved {
                record: record.clone(),
            })
    }

    /// Up to `limit` pending requests, oldest first.
    #[must_use]
    pub fn list_pending(&self, limit: usize) -> Vec<ApprovalRequest> {
        let state = self.lock_state();
        let mut pending: Vec<ApprovalRequest> = state.pending.values().cloned().collect();
        pending.sort_by_key(|request| request.created_at);
        pending.truncate(limit);
        pending
    }

    /// Aggregate statistics over pending and history.
    #[must_use]
    pub fn stats(&self) -> WorkflowStats {
        let state = self.lock_state();
        let mut by_status: BTreeMap<ApprovalStatus, usize> = BTreeMap::new();
        let mut by_risk: BTreeMap<RiskLevel, usize> = BTreeMap::new();

        for record in &state.history {
            let status_count = by_status.entry(record.status).or_default();
            *status_count = status_count.saturating_add(1);
            let risk_count = by_risk.entry(record.risk_level).or_default();
            *risk_count = risk_count.saturating_add(1);
        }
        for request in state.pending.values() {
            let risk_count = by_risk.entry(request.risk_level).or_default();
            *risk_count = risk_count.saturating_add(1);
        }

        WorkflowStats {
            total: state.pending.len().saturating_add(state.history.len()),
            pending: state.pending.len(),
            by_status,
            by_risk,
        }
    }

    /// The full resolution history, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<ApprovalRecord> {
        self.lock_state().history.clone()
    }

    /// Resolve a pending entry via `make_record`; first writer wins.
    fn resolve(
        &self,
        id: &RequestId,
        make_record: impl FnOnce(&ApprovalRequest) -> ApprovalRecord,
    ) -> bool {
        let mut state = self.lock_state();
        let Some(request) = state.pending.remove(id) else {
            return false;
        };
        let record = make_record(&request);
        tracing::info!(%id, status = %record.status, "approval request resolved");
        state.resolved.insert(*id);
        state.history.push(record);
        true
    }

    fn check_unseen(state: &WorkflowState, id: &RequestId) -> ApprovalResult<()> {
        if state.pending.contains_key(id) || state.resolved.contains(id) {
            return Err(ApprovalError::DuplicateRequest(*id));
        }
        Ok(())
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap_or_else(|e| {
            tracing::warn!("approval workflow lock poisoned, recovering");
            e.into_inner()
        })
    }
}

#[cfg(test)]
#[allow(clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use palisade_core::CallerId;

    fn workflow() -> ApprovalWorkflow {
        ApprovalWorkflow::with_limits(Duration::from_secs(3600), 100)
    }

    fn request(subject: &str) -> ApprovalRequest {
        ApprovalRequest::new(
            RequestId::new(),
            subject,
            CallerId::new("agent-1"),
            RiskLevel::High,
        )
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    #[test]
    fn test_submit_and_list_pending() {
        let wf = workflow();
        wf.submit(request("delete_file")).unwrap();
        wf.submit(request("send_mail")).unwrap();

        let pending = wf.list_pending(10);
        assert_eq!(pending.len(), 2);
        assert_eq!(wf.list_pending(1).len(), 1);
    }

    #[test]
    fn test_duplicate_submit_rejected() {
        let wf = workflow();
        let req = request("delete_file");
        wf.submit(req.clone()).unwrap();
        assert!(matches!(
            wf.submit(req),
            Err(ApprovalError::DuplicateRequest(_))
        ));
    }

    #[test]
    fn test_resolved_id_cannot_be_resubmitted() {
        let wf = workflow();
        let req = request("delete_file");
        let id = wf.submit(req.clone()).unwrap();
        assert!(wf.approve(&id, "op"));
        assert!(matches!(
            wf.submit(req),
            Err(ApprovalError::DuplicateRequest(_))
        ));
    }

    #[test]
    fn test_queue_full() {
        let wf = ApprovalWorkflow::with_limits(Duration::from_secs(3600), 2);
        wf.submit(request("a")).unwrap();
        wf.submit(request("b")).unwrap();
        assert!(matches!(
            wf.submit(request("c")),
            Err(ApprovalError::QueueFull { limit: 2 })
        ));
    }

    // -----------------------------------------------------------------------
    // Approve / reject
    // -----------------------------------------------------------------------

    #[test]
    fn test_approve_is_not_reentrant() {
        let wf = workflow();
        let id = wf.submit(request("delete_file")).unwrap();

        assert!(wf.approve(&id, "operator-1"));
        assert!(!wf.approve(&id, "operator-2"));

        let history = wf.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ApprovalStatus::ManuallyApproved);
        assert_eq!(history[0].decided_by.as_deref(), Some("operator-1"));
    }

    #[test]
    fn test_reject_records_reason() {
        let wf = workflow();
        let id = wf.submit(request("delete_file")).unwrap();

        assert!(wf.reject(&id, "operator-1", "not during business hours"));
        assert!(!wf.reject(&id, "operator-1", "again"));

        let history = wf.history();
        assert_eq!(history[0].status, ApprovalStatus::Rejected);
        assert_eq!(
            history[0].notes.as_deref(),
            Some("not during business hours")
        );
    }

    #[test]
    fn test_approve_unknown_id() {
        let wf = workflow();
        assert!(!wf.approve(&RequestId::new(), "operator-1"));
    }

    // -----------------------------------------------------------------------
    // Auto approval
    // -----------------------------------------------------------------------

    #[test]
    fn test_auto_approval_skips_pending() {
        let wf = workflow();
        let req = request("read_file");
        let id = wf.record_auto_approval(&req).unwrap();

        assert!(wf.list_pending(10).is_empty());
        let Some(ApprovalState::Resolved { record }) = wf.status(&id) else {
            panic!("expected resolved");
        };
        assert_eq!(record.status, ApprovalStatus::AutoApproved);
    }

    // -----------------------------------------------------------------------
    // TTL sweep
    // -----------------------------------------------------------------------

    #[test]
    fn test_sweep_moves_only_expired() {
        let wf = ApprovalWorkflow::with_limits(Duration::from_secs(60), 100);
        let id = wf.submit(request("delete_file")).unwrap();

        // Not yet expired
        assert_eq!(wf.sweep_expired(Timestamp::now()), 0);
        assert!(matches!(wf.status(&id), Some(ApprovalState::Pending { .. })));

        // Well past the TTL
        let later = Timestamp::from_datetime(chrono::Utc::now() + chrono::Duration::seconds(120));
        assert_eq!(wf.sweep_expired(later), 1);

        let Some(ApprovalState::Resolved { record }) = wf.status(&id) else {
            panic!("expected resolved");
        };
        assert_eq!(record.status, ApprovalStatus::TimedOut);
        assert!(!wf.approve(&id, "operator-1"));
    }

    #[test]
    fn test_sweep_approve_race_single_winner() {
        use std::sync::Arc;

        for _ in 0..20 {
            let wf = Arc::new(ApprovalWorkflow::with_limits(Duration::from_millis(1), 100));
            let id = wf.submit(request("delete_file")).unwrap();
            let later =
                Timestamp::from_datetime(chrono::Utc::now() + chrono::Duration::seconds(60));

            let approve_wf = Arc::clone(&wf);
            let approve_id = id;
            let approver =
                std::thread::spawn(move || approve_wf.approve(&approve_id, "operator-1"));
            let sweep_wf = Arc::clone(&wf);
            let sweeper = std::thread::spawn(move || sweep_wf.sweep_expired(later));

            let approved = approver.join().unwrap();
            let swept = sweeper.join().unwrap();

            // Exactly one writer won, and history holds exactly one record
            assert!(approved ^ (swept == 1), "approved={approved} swept={swept}");
            let records: Vec<_> = wf
                .history()
                .into_iter()
                .filter(|record| record.id == id)
                .collect();
            assert_eq!(records.len(), 1);
        }
    }

    // -----------------------------------------------------------------------
    // Stats
    // -----------------------------------------------------------------------

    #[test]
    fn test_stats_breakdown() {
        let wf = workflow();
        let approved = wf.submit(request("a")).unwrap();
        let rejected = wf.submit(request("b")).unwrap();
        wf.submit(request("c")).unwrap();
        wf.record_auto_approval(&request("d")).unwrap();

        wf.approve(&approved, "op");
        wf.reject(&rejected, "op", "no");

        let stats = wf.stats();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.by_status[&ApprovalStatus::ManuallyApproved], 1);
        assert_eq!(stats.by_status[&ApprovalStatus::Rejected], 1);
        assert_eq!(stats.by_status[&ApprovalStatus::AutoApproved], 1);
        assert_eq!(stats.by_risk[&RiskLevel::High], 4);
    }
}
