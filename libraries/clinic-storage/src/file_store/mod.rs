//! JSON file store
//!
//! Writes the envelope to `<path>.tmp`, fsyncs it, then renames it over
//! `<path>`. A reader only ever sees the old file or the new one.
//!
//! # Example
//!
//! ```rust,no_run
//! use clinic_core::QueueStore;
//! use clinic_storage::FileQueueStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = FileQueueStore::new("./data/outbox.json");
//! let snapshot = store.load().await?;
//! println!("{} queued items", snapshot.items.len());
//! # Ok(())
//! # }
//! ```

use crate::envelope;
use crate::error::StorageError;
use async_trait::async_trait;
use clinic_core::{QueueSnapshot, QueueStore};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

type Result<T> = std::result::Result<T, StorageError>;

/// Queue persisted as a single JSON file
pub struct FileQueueStore {
    path: PathBuf,
    // Serializes writers so two saves never share the temp file
    write_lock: Mutex<()>,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Location of the committed file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "outbox.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read(&self) -> Result<QueueSnapshot> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => envelope::decode(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No queue file yet, starting empty");
                Ok(QueueSnapshot::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, snapshot: &QueueSnapshot) -> Result<()> {
        let bytes = envelope::encode(snapshot)?;
        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(
            path = %self.path.display(),
            items = snapshot.items.len(),
            bytes = bytes.len(),
            "Queue file written"
        );
        Ok(())
    }
}

#[async_trait]
impl QueueStore for FileQueueStore {
    async fn load(&self) -> clinic_core::Result<QueueSnapshot> {
        Ok(self.read().await?)
    }

    async fn save(&self, snapshot: &QueueSnapshot) -> clinic_core::Result<()> {
        Ok(self.write(snapshot).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_path_is_sibling() {
        let store = FileQueueStore::new("/data/outbox.json");
        assert_eq!(store.temp_path(), PathBuf::from("/data/outbox.json.tmp"));
    }
}
