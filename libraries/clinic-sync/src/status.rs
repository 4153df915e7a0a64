//! Status publisher
//!
//! Holds the cached [`QueueStatus`] behind a `watch` channel: subscribers are
//! woken on change, pollers read the latest value.

use chrono::{DateTime, Utc};
use clinic_core::QueueStatus;
use tokio::sync::watch;
use tracing::warn;

pub struct StatusPublisher {
    tx: watch::Sender<QueueStatus>,
    connectivity: watch::Receiver<bool>,
}

impl StatusPublisher {
    /// `connectivity` supplies `is_online` for every published status
    pub fn new(connectivity: watch::Receiver<bool>) -> Self {
        let is_online = *connectivity.borrow();
        let (tx, _) = watch::channel(QueueStatus {
            is_online,
            ..QueueStatus::default()
        });
        Self { tx, connectivity }
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> QueueStatus {
        self.tx.borrow().clone()
    }

    /// Replace the counts, keeping the flags that are not derived from items
    pub fn publish_counts(&self, counts: &QueueStatus) {
        let is_online = *self.connectivity.borrow();
        self.tx.send_if_modified(|status| {
            let next = QueueStatus {
                syncing: status.syncing,
                is_online,
                last_sync_at: status.last_sync_at,
                last_warning: status.last_warning.clone(),
                ..counts.clone()
            };
            replace(status, next)
        });
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.tx.send_if_modified(|status| {
            let changed = status.syncing != syncing;
            status.syncing = syncing;
            changed
        });
    }

    pub fn set_last_sync(&self, at: DateTime<Utc>) {
        self.tx.send_modify(|status| status.last_sync_at = Some(at));
    }

    pub fn refresh_online(&self) {
        let is_online = *self.connectivity.borrow();
        self.tx.send_if_modified(|status| {
            let changed = status.is_online != is_online;
            status.is_online = is_online;
            changed
        });
    }

    /// Surface a store-level problem to the application
    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(warning = %message, "Queue warning");
        self.tx
            .send_modify(|status| status.last_warning = Some(message));
    }
}

fn replace(status: &mut QueueStatus, next: QueueStatus) -> bool {
    if *status == next {
        false
    } else {
        *status = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_keep_flags() {
        let (_online_tx, online_rx) = watch::channel(true);
        let publisher = StatusPublisher::new(online_rx);
        publisher.set_syncing(true);
        publisher.warn("store corrupted");

        publisher.publish_counts(&QueueStatus {
            total: 3,
            pending: 3,
            ..QueueStatus::default()
        });

        let status = publisher.current();
        assert_eq!(status.total, 3);
        assert!(status.syncing);
        assert!(status.is_online);
        assert_eq!(status.last_warning.as_deref(), Some("store corrupted"));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let (online_tx, online_rx) = watch::channel(false);
        let publisher = StatusPublisher::new(online_rx);
        let mut rx = publisher.subscribe();
        rx.borrow_and_update();

        publisher.set_syncing(false);
        assert!(!rx.has_changed().unwrap());

        online_tx.send(true).unwrap();
        publisher.refresh_online();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_online);
    }
}
