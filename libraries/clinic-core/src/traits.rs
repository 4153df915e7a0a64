/// Core traits for the clinic offline queue
use crate::error::{RemoteError, Result};
use crate::types::{QueueSnapshot, RemoteReceipt, RemoteRequest};
use async_trait::async_trait;

/// Durable store for the queue and its identifier resolution table
///
/// Implementers must make `save` atomic: a concurrent or subsequent `load`
/// sees either the previous snapshot or the new one, never a mix.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Load the full persisted state
    ///
    /// Returns an empty snapshot when nothing has been saved yet.
    ///
    /// # Errors
    /// Returns `ClinicError::StoreCorruption` if the persisted bytes cannot be
    /// deserialized, `ClinicError::Persistence` if they cannot be read
    async fn load(&self) -> Result<QueueSnapshot>;

    /// Atomically overwrite the persisted state
    ///
    /// # Errors
    /// Returns `ClinicError::Persistence` if the write fails
    async fn save(&self, snapshot: &QueueSnapshot) -> Result<()>;
}

/// Remote REST collaborator
///
/// One call per queue item. The implementation maps `(resource, operation)`
/// to a verb and path and classifies the response.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    /// Submit one resolved request
    ///
    /// # Errors
    /// Returns a classified `RemoteError`; transient errors are retried
    async fn submit(&self, request: &RemoteRequest)
        -> std::result::Result<RemoteReceipt, RemoteError>;
}

/// Active reachability check used to feed the connectivity monitor
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns true if the remote API answered
    async fn probe(&self) -> bool;
}
