/// Core error types for the clinic offline queue
use crate::types::ItemId;
use thiserror::Error;

/// Result type alias using `ClinicError`
pub type Result<T> = std::result::Result<T, ClinicError>;

/// Core error type for the clinic offline queue
#[derive(Error, Debug)]
pub enum ClinicError {
    /// Durable store failed to read or write
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Persisted state could not be deserialized
    #[error("Store corruption: {0}")]
    StoreCorruption(String),

    /// Payload does not match the expected shape for its resource/operation
    #[error("Invalid payload for {resource} {operation}: {reason}")]
    InvalidPayload {
        resource: String,
        operation: String,
        reason: String,
    },

    /// Resource name not known to the queue
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Operation name not known to the queue
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    /// Queue item not found
    #[error("Queue item not found: {0}")]
    ItemNotFound(ItemId),

    /// Requested transition is not valid for the item's current status
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Remote call failed
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl ClinicError {
    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a store corruption error
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::StoreCorruption(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Whether this error came from the durable store
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }
}

/// Outcome classification of a failed remote call.
///
/// The sync engine's retry policy only looks at [`RemoteError::is_transient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset, or similar
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete within its timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    /// 5xx (or 408/429) from the server
    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// 4xx validation, conflict, or authorization failure
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// 2xx with a body the client could not use
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl RemoteError {
    /// Transient errors are retried with backoff; the rest are terminal.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rejections_are_terminal() {
        assert!(RemoteError::Network("reset".into()).is_transient());
        assert!(RemoteError::Timeout(30_000).is_transient());
        assert!(RemoteError::Server {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(RemoteError::InvalidResponse("no id".into()).is_transient());
        assert!(!RemoteError::Rejected {
            status: 422,
            message: "nombre requerido".into()
        }
        .is_transient());
    }

    #[test]
    fn test_persistence_classification() {
        assert!(ClinicError::persistence("disk full").is_persistence());
        assert!(!ClinicError::corruption("bad json").is_persistence());
    }
}
