//! In-memory store
//!
//! Holds the encoded envelope rather than the snapshot itself, so a value
//! that would not survive serialization fails here the same way it would on
//! disk. Cloning shares the underlying buffer, which lets tests simulate a
//! process restart by building a second queue over the same store.

use crate::envelope;
use async_trait::async_trait;
use clinic_core::{ClinicError, QueueSnapshot, QueueStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inner {
    blob: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    saves: AtomicUsize,
}

/// Queue held in process memory
#[derive(Clone, Default)]
pub struct MemoryQueueStore {
    inner: Arc<Inner>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from raw persisted bytes (e.g. a corrupted blob)
    pub fn from_raw(bytes: impl Into<Vec<u8>>) -> Self {
        let store = Self::default();
        if let Ok(mut blob) = store.inner.blob.lock() {
            *blob = Some(bytes.into());
        }
        store
    }

    /// Make every subsequent save fail with a persistence error
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves
    pub fn save_count(&self) -> usize {
        self.inner.saves.load(Ordering::SeqCst)
    }

    /// Current raw bytes, if anything was saved
    pub fn raw(&self) -> Option<Vec<u8>> {
        self.inner.blob.lock().ok().and_then(|b| b.clone())
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn load(&self) -> clinic_core::Result<QueueSnapshot> {
        match self.raw() {
            Some(bytes) => Ok(envelope::decode(&bytes)?),
            None => Ok(QueueSnapshot::default()),
        }
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> clinic_core::Result<()> {
        if self.inner.fail_writes.load(Ordering::SeqCst) {
            return Err(ClinicError::persistence("simulated write failure"));
        }
        let bytes = envelope::encode(snapshot)?;
        let mut blob = self
            .inner
            .blob
            .lock()
            .map_err(|_| ClinicError::persistence("memory store lock poisoned"))?;
        *blob = Some(bytes);
        self.inner.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinic_core::{Operation, QueueItem, Resource};
    use serde_json::json;

    #[tokio::test]
    async fn test_clone_shares_state() {
        let store = MemoryQueueStore::new();
        let restarted = store.clone();

        let snapshot = QueueSnapshot {
            items: vec![QueueItem::new(
                Resource::Patient,
                Operation::Create,
                json!({"nombre": "Ana"}),
            )],
            ..QueueSnapshot::default()
        };
        store.save(&snapshot).await.unwrap();

        assert_eq!(restarted.load().await.unwrap(), snapshot);
        assert_eq!(restarted.save_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_writes_keep_previous_blob() {
        let store = MemoryQueueStore::new();
        store.save(&QueueSnapshot::default()).await.unwrap();
        let before = store.raw();

        store.set_fail_writes(true);
        let snapshot = QueueSnapshot {
            items: vec![QueueItem::new(
                Resource::Patient,
                Operation::Create,
                json!({"nombre": "Ana"}),
            )],
            ..QueueSnapshot::default()
        };
        let err = store.save(&snapshot).await.unwrap_err();
        assert!(err.is_persistence());
        assert_eq!(store.raw(), before);
    }

    #[tokio::test]
    async fn test_corrupt_blob_reports_corruption() {
        let store = MemoryQueueStore::from_raw("garbage");
        let err = store.load().await.unwrap_err();
        assert!(matches!(err, ClinicError::StoreCorruption(_)));
    }
}
