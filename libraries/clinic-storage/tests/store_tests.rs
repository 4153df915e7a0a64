//! Durable store integration tests for the file and `SQLite` backends

mod test_helpers;

use clinic_core::{ClinicError, ItemStatus, QueueSnapshot, QueueStore};
use clinic_storage::{FileQueueStore, SqliteQueueStore, CURRENT_VERSION};
use test_helpers::{sample_snapshot, TestDir};

// =============================================================================
// File Store
// =============================================================================

mod file_store {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_loads_empty() {
        let dir = TestDir::new();
        let store = dir.file_store();

        let snapshot = store.load().await.unwrap();
        assert!(snapshot.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_after_restart() {
        let dir = TestDir::new();
        let snapshot = sample_snapshot();

        dir.file_store().save(&snapshot).await.unwrap();

        // A fresh store over the same path stands in for a new process
        let loaded = dir.file_store().load().await.unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(loaded.items[2].status, ItemStatus::Failed);
        assert_eq!(loaded.identifiers.len(), 1);
    }

    #[tokio::test]
    async fn test_save_leaves_no_temp_file() {
        let dir = TestDir::new();
        let store = dir.file_store();
        store.save(&sample_snapshot()).await.unwrap();

        let tmp = store.path().with_file_name("outbox.json.tmp");
        assert!(store.path().exists());
        assert!(!tmp.exists());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_previous_state() {
        let dir = TestDir::new();
        let store = dir.file_store();
        store.save(&sample_snapshot()).await.unwrap();
        store.save(&QueueSnapshot::default()).await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_store_corruption() {
        let dir = TestDir::new();
        let store = dir.file_store();
        std::fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        std::fs::write(store.path(), b"{\"version\": 1, \"items\": [tru").unwrap();

        match store.load().await.unwrap_err() {
            ClinicError::StoreCorruption(_) => {}
            e => panic!("Expected StoreCorruption, got: {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_blob_is_versioned_json() {
        let dir = TestDir::new();
        let store = dir.file_store();
        store.save(&sample_snapshot()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["version"], serde_json::json!(CURRENT_VERSION));
        assert_eq!(raw["items"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unwritable_location_is_persistence_error() {
        let dir = TestDir::new();
        // A regular file where the parent directory should be
        let blocker = dir.dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let store = FileQueueStore::new(blocker.join("outbox.json"));

        let err = store.save(&sample_snapshot()).await.unwrap_err();
        assert!(err.is_persistence(), "got {:?}", err);
    }
}

// =============================================================================
// SQLite Store
// =============================================================================

mod sqlite_store {
    use super::*;

    #[tokio::test]
    async fn test_empty_database_loads_empty() {
        let dir = TestDir::new();
        let store = dir.sqlite_store().await;

        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load_after_reopen() {
        let dir = TestDir::new();
        let snapshot = sample_snapshot();

        {
            let store = dir.sqlite_store().await;
            store.save(&snapshot).await.unwrap();
            store.pool().close().await;
        }

        let reopened = dir.sqlite_store().await;
        assert_eq!(reopened.load().await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_repeated_saves_keep_single_row() {
        let dir = TestDir::new();
        let store = dir.sqlite_store().await;

        store.save(&sample_snapshot()).await.unwrap();
        store.save(&sample_snapshot()).await.unwrap();
        store.save(&QueueSnapshot::default()).await.unwrap();

        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM outbox_snapshot")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 1);
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_row_is_store_corruption() {
        let dir = TestDir::new();
        let store = dir.sqlite_store().await;

        sqlx::query(
            "INSERT INTO outbox_snapshot (id, version, body, saved_at) VALUES (1, 1, 'nope', '')",
        )
        .execute(store.pool())
        .await
        .unwrap();

        assert!(matches!(
            store.load().await.unwrap_err(),
            ClinicError::StoreCorruption(_)
        ));
    }

    #[tokio::test]
    async fn test_new_over_migrated_pool() {
        let dir = TestDir::new();
        let opened = dir.sqlite_store().await;
        let store = SqliteQueueStore::new(opened.pool().clone());

        store.save(&sample_snapshot()).await.unwrap();
        assert_eq!(opened.load().await.unwrap().items.len(), 3);
    }
}
