//! Contract for the remote record store client.

use async_trait::async_trait;
use thiserror::Error;

use crate::transactions::Transaction;

/// A failed push attempt. Every variant routes the entry into the failure
/// queue; none of them reaches the entry-creation caller.
#[derive(Debug, Error)]
pub enum PushError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote store answered with a non-success status
    #[error("unexpected status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },

    /// The entry could not be encoded for the wire
    #[error("encode error: {0}")]
    Encode(String),
}

/// Client for the remote record store.
///
/// Implementations perform exactly one attempt per call and never retry
/// internally; retry policy lives with the ledger engine. Calls are
/// independent and may run concurrently.
#[async_trait]
pub trait RemoteLedgerClient: Send + Sync {
    /// Push one entry, returning the identifier the remote store assigned.
    async fn create_entry(&self, entry: &Transaction) -> Result<String, PushError>;

    /// Request remote deletion of a previously pushed entry. Best-effort:
    /// the caller logs the outcome and never retries.
    async fn archive_entry(&self, external_id: &str) -> Result<(), PushError>;
}
