//! Clinic Storage
//!
//! Durable stores for the offline operation queue and its identifier
//! resolution table.
//!
//! # Architecture
//!
//! - **Versioned Blob**: every backend persists the same JSON envelope
//!   (`{ version, saved_at, items, identifiers }`), so a queue can move
//!   between backends and future schema changes can upgrade old blobs
//! - **Atomic Overwrite**: a `save` is either fully visible or not at all
//!   (temp file + rename, or one SQL transaction)
//! - **Backends**: [`FileQueueStore`], [`SqliteQueueStore`], [`MemoryQueueStore`]
//!
//! # Example
//!
//! ```rust,no_run
//! use clinic_core::{QueueSnapshot, QueueStore};
//! use clinic_storage::SqliteQueueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SqliteQueueStore::open("sqlite://outbox.db").await?;
//!
//! let snapshot = store.load().await?;
//! store.save(&snapshot).await?;
//! # Ok(())
//! # }
//! ```

mod envelope;
mod error;

// Backends
pub mod file_store;
pub mod memory_store;
pub mod sqlite_store;

pub use envelope::{decode, encode, PersistedQueue, CURRENT_VERSION};
pub use error::StorageError;
pub use file_store::FileQueueStore;
pub use memory_store::MemoryQueueStore;
pub use sqlite_store::SqliteQueueStore;

use sqlx::migrate::Migrator;
use sqlx::sqlite::SqlitePool;

// Embed migrations into binary
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Run database migrations
///
/// # Errors
///
/// Returns an error if migrations fail to run
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Create a new `SQLite` pool
///
/// # Arguments
///
/// * `database_url` - `SQLite` connection string (e.g., `<sqlite://outbox.db>`)
///
/// # Errors
///
/// Returns an error if the connection fails
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
    use std::str::FromStr;

    tracing::debug!(database_url = %database_url, "Creating SQLite pool");

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(std::time::Duration::from_secs(30));

    // The queue is written by one engine at a time; a small pool is enough
    SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
}
