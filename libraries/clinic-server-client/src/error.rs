//! Error types for the clinic server client.

use clinic_core::RemoteError;
use thiserror::Error;

/// Errors that can occur when talking to the clinic server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned a retryable error response (5xx, 408, 429)
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Server refused the request (validation, conflict, authorization)
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// The request could not be mapped onto a route
    #[error("Cannot build route: {0}")]
    Route(String),

    /// Failed to parse server response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// A create succeeded but the body carried no identifier
    #[error("Create response carried no identifier")]
    MissingIdentifier,

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),

    /// Request exceeded its timeout
    #[error("Request timed out after {0} ms")]
    Timeout(u64),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl ServerClientError {
    /// Classify an HTTP status that is not a success
    pub fn from_status(status: u16, message: String) -> Self {
        match status {
            408 | 429 => Self::ServerError { status, message },
            400..=499 => Self::Rejected { status, message },
            _ => Self::ServerError { status, message },
        }
    }
}

impl From<ServerClientError> for RemoteError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::Request(e) => RemoteError::Network(e.to_string()),
            ServerClientError::ServerUnreachable(msg) => RemoteError::Network(msg),
            ServerClientError::Timeout(ms) => RemoteError::Timeout(ms),
            ServerClientError::ServerError { status, message } => {
                RemoteError::Server { status, message }
            }
            ServerClientError::Rejected { status, message } => {
                RemoteError::Rejected { status, message }
            }
            // A request we cannot even address will never succeed by retrying
            ServerClientError::Route(msg) | ServerClientError::InvalidUrl(msg) => {
                RemoteError::Rejected {
                    status: 400,
                    message: msg,
                }
            }
            ServerClientError::ParseError(msg) => RemoteError::InvalidResponse(msg),
            ServerClientError::MissingIdentifier => {
                RemoteError::InvalidResponse("create response carried no identifier".into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ServerClientError::from_status(422, String::new()),
            ServerClientError::Rejected { status: 422, .. }
        ));
        assert!(matches!(
            ServerClientError::from_status(409, String::new()),
            ServerClientError::Rejected { .. }
        ));
        assert!(matches!(
            ServerClientError::from_status(429, String::new()),
            ServerClientError::ServerError { .. }
        ));
        assert!(matches!(
            ServerClientError::from_status(503, String::new()),
            ServerClientError::ServerError { status: 503, .. }
        ));
    }

    #[test]
    fn test_remote_error_mapping() {
        let remote: RemoteError = ServerClientError::from_status(400, "bad".into()).into();
        assert!(!remote.is_transient());

        let remote: RemoteError = ServerClientError::Timeout(5_000).into();
        assert_eq!(remote, RemoteError::Timeout(5_000));

        let remote: RemoteError = ServerClientError::MissingIdentifier.into();
        assert!(remote.is_transient());
    }
}
