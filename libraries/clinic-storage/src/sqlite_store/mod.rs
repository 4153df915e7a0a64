//! `SQLite` snapshot store
//!
//! The whole queue lives in one row of `outbox_snapshot`; each save is a
//! single upsert inside a transaction.

use crate::envelope::{self, CURRENT_VERSION};
use crate::error::StorageError;
use crate::{create_pool, run_migrations};
use async_trait::async_trait;
use chrono::Utc;
use clinic_core::{QueueSnapshot, QueueStore};
use sqlx::SqlitePool;
use tracing::debug;

type Result<T> = std::result::Result<T, StorageError>;

/// Queue persisted in a `SQLite` database
pub struct SqliteQueueStore {
    pool: SqlitePool,
}

impl SqliteQueueStore {
    /// Wrap an existing pool; migrations must already have run
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations
    pub async fn open(database_url: &str) -> Result<Self> {
        let pool = create_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn read(&self) -> Result<QueueSnapshot> {
        let body: Option<String> =
            sqlx::query_scalar("SELECT body FROM outbox_snapshot WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;

        match body {
            Some(body) => envelope::decode(body.as_bytes()),
            None => Ok(QueueSnapshot::default()),
        }
    }

    async fn write(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let bytes = envelope::encode(snapshot)?;
        let body = String::from_utf8(bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let saved_at = Utc::now().to_rfc3339();
        let version = i64::from(CURRENT_VERSION);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO outbox_snapshot (id, version, body, saved_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                version = excluded.version,
                body = excluded.body,
                saved_at = excluded.saved_at
            "#,
        )
        .bind(version)
        .bind(&body)
        .bind(&saved_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(items = snapshot.items.len(), "Queue snapshot committed");
        Ok(())
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn load(&self) -> clinic_core::Result<QueueSnapshot> {
        Ok(self.read().await?)
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> clinic_core::Result<()> {
        Ok(self.write(snapshot).await?)
    }
}
