//! The bounded audit log and external sink trait.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use crate::entry::AuditEntry;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// External destination for audit entries (persistence, metrics export).
///
/// Implementations must be thread-safe; `record` is called inline from
/// gate paths and must not block on I/O — buffer and flush elsewhere.
pub trait AuditSink: Send + Sync {
    /// Receive one entry. Delivery is best-effort fan-out.
    fn record(&self, entry: &AuditEntry);
}

/// Fixed-capacity, in-memory ring of gate decisions.
///
/// Appends are O(1); once full, the oldest entry is overwritten. Entries
/// from a single caller's sequential calls keep their order; no global
/// ordering is promised across concurrent callers.
pub struct AuditLog {
    entries: RwLock<VecDeque<AuditEntry>>,
    capacity: usize,
    sink: Option<Arc<dyn AuditSink>>,
}

impl AuditLog {
    /// Create a log with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a log holding at most `capacity` entries.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
            sink: None,
        }
    }

    /// Attach an external sink receiving every recorded entry.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Record a decision.
    pub fn record(&self, entry: AuditEntry) {
        if let Some(sink) = &self.sink {
            sink.record(&entry);
        }
        let mut entries = self.write_entries();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// The most recent `n` entries, newest last.
    #[must_use]
    pub fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let entries = self.read_entries();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// Every retained entry, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<AuditEntry> {
        self.read_entries().iter().cloned().collect()
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    /// Whether the log holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    /// Maximum number of retained entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, VecDeque<AuditEntry>> {
        self.entries.read().unwrap_or_else(|e| {
            tracing::warn!("audit log lock poisoned, recovering");
            e.into_inner()
        })
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, VecDeque<AuditEntry>> {
        self.entries.write().unwrap_or_else(|e| {
            tracing::warn!("audit log lock poisoned, recovering");
            e.into_inner()
        })
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AuditLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuditLog")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}
