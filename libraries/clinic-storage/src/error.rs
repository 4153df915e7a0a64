/// Storage-specific errors
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Persisted blob could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Blob was written by a newer schema than this build understands
    #[error("Unsupported queue format version {found} (newest known: {supported})")]
    UnsupportedVersion { found: u64, supported: u32 },

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl StorageError {
    /// Whether the failure means the persisted bytes are unusable
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::Serialization(_) | Self::UnsupportedVersion { .. }
        )
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<StorageError> for clinic_core::ClinicError {
    fn from(err: StorageError) -> Self {
        if err.is_corruption() {
            clinic_core::ClinicError::corruption(err.to_string())
        } else {
            clinic_core::ClinicError::persistence(err.to_string())
        }
    }
}
