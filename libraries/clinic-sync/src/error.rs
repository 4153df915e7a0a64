use clinic_core::ClinicError;
use thiserror::Error;

/// Errors that can occur during queue and sync operations
#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    Core(#[from] ClinicError),

    #[error("Queue manager not initialized")]
    NotInitialized,

    #[error("Queue manager has been shut down")]
    ShutDown,
}

impl SyncError {
    /// Whether the durable store failed
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_persistence())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
