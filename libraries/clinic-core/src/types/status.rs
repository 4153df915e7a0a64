/// Queue status aggregate
use super::queue_item::{ItemStatus, QueueItem};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Derived, read-only view of the queue
///
/// `pending + completed + failed == total` whenever no item is mid-flight;
/// an item in `syncing` is counted only in `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    /// True while the sync engine holds its single-flight lock
    pub syncing: bool,
    pub is_online: bool,
    /// When the last sync pass finished
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Most recent store-level warning (corruption fallback, failed save)
    #[serde(default)]
    pub last_warning: Option<String>,
}

impl QueueStatus {
    /// Count items by status
    pub fn from_items(items: &[QueueItem], syncing: bool, is_online: bool) -> Self {
        let mut status = Self {
            total: items.len(),
            syncing,
            is_online,
            ..Self::default()
        };
        for item in items {
            match item.status {
                ItemStatus::Pending => status.pending += 1,
                ItemStatus::Completed => status.completed += 1,
                ItemStatus::Failed => status.failed += 1,
                ItemStatus::Syncing => {}
            }
        }
        status
    }

    /// Items not yet completed or terminally failed
    pub fn outstanding(&self) -> usize {
        self.total - self.completed - self.failed
    }
}
