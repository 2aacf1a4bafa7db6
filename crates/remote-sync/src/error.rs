//! Error types for the remote sync crate.

use kakeibo_core::remote::PushError;
use thiserror::Error;

/// Result type alias for remote sync operations.
pub type Result<T> = std::result::Result<T, RemoteSyncError>;

/// Errors that can occur while talking to the remote record store.
#[derive(Debug, Error)]
pub enum RemoteSyncError {
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API error response from the record store
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid request (missing required data, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Authentication error (missing or invalid token)
    #[error("Authentication error: {0}")]
    Auth(String),
}

impl RemoteSyncError {
    /// Create an API error from status and message
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    /// HTTP status if this is an API error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Map a remote sync failure into the core push taxonomy: transport
/// failures, unexpected statuses, and local encode problems.
impl From<RemoteSyncError> for PushError {
    fn from(err: RemoteSyncError) -> Self {
        match err {
            RemoteSyncError::Http(inner) => PushError::Transport(inner.to_string()),
            RemoteSyncError::Api { status, message } => {
                PushError::UnexpectedStatus { status, message }
            }
            RemoteSyncError::Json(inner) => PushError::Encode(inner.to_string()),
            RemoteSyncError::InvalidRequest(message) | RemoteSyncError::Auth(message) => {
                PushError::Encode(message)
            }
        }
    }
}
