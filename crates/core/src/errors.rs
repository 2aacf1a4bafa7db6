//! Error types shared across the core crate.

use thiserror::Error;

use crate::store::StoreError;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the ledger engine.
#[derive(Debug, Error)]
pub enum Error {
    /// Collection persistence error
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Malformed entry handed to the engine
    #[error("Validation error: {0}")]
    Validation(String),

    /// The startup sequence was invoked more than once in this process
    #[error("Startup sequence already ran")]
    StartupAlreadyRan,
}

impl Error {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}
