use chrono::{DateTime, Utc};
use clinic_core::{IdentifierTable, QueueItem, QueueStatus};
use serde::{Deserialize, Serialize};

/// What triggered the sync pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,              // Application called sync_queue
    Scheduled,           // Periodic timer
    ConnectivityRestored, // Debounced online event
}

/// Counters for one sync run (a pass plus any coalesced follow-up)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub attempted: usize,
    pub completed: usize,
    pub rescheduled: usize,
    pub failed: usize,
    /// Skipped this pass because a parent item has not synced yet
    pub deferred: usize,
    /// Skipped this pass because their backoff has not elapsed
    pub backing_off: usize,
    pub passes: usize,
    pub duration_ms: u64,
}

impl SyncReport {
    pub(crate) fn absorb(&mut self, other: &SyncReport) {
        self.attempted += other.attempted;
        self.completed += other.completed;
        self.rescheduled += other.rescheduled;
        self.failed += other.failed;
        self.deferred = other.deferred;
        self.backing_off = other.backing_off;
        self.passes += other.passes;
    }
}

/// Result of asking for a sync
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    /// The pass ran to the end of the queue
    Completed(SyncReport),
    /// The pass was aborted between items
    Cancelled(SyncReport),
    /// Another pass was running; it will run once more when it finishes
    Coalesced,
    /// The connectivity monitor reports offline; nothing was attempted
    Offline,
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            Self::Completed(report) | Self::Cancelled(report) => Some(report),
            Self::Coalesced | Self::Offline => None,
        }
    }
}

/// Read-only debug view of the whole queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInspection {
    pub status: QueueStatus,
    pub items: Vec<QueueItem>,
    pub identifiers: IdentifierTable,
    /// Persisted state is behind the in-memory queue
    pub unsaved_changes: bool,
    pub inspected_at: DateTime<Utc>,
}
