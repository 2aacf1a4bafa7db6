//! Pluggable persistence contract for the three ledger collections.
//!
//! A store is pure load/save: each collection is read and overwritten as a
//! whole, and no business logic lives behind this seam. There is no
//! cross-collection transaction; callers persist each collection
//! immediately after mutating it.

use thiserror::Error;

use crate::transactions::Transaction;

/// The three independently persisted collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Confirmed entries.
    Ledger,
    /// Pending future occurrences, at most one per recurring group.
    Schedule,
    /// Entries whose remote push failed and awaits retry.
    Failed,
}

impl Collection {
    /// Stable storage key of the collection.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Ledger => "transactions",
            Collection::Schedule => "scheduled_transactions",
            Collection::Failed => "failed_transactions",
        }
    }
}

/// Errors raised by a collection store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Local serialization failure on persist
    #[error("Encode error: {0}")]
    Encode(String),

    /// Persisted data could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable key-value persistence of the ledger collections.
pub trait LedgerStore: Send + Sync {
    /// Load one collection. An absent collection loads as empty.
    fn load(&self, collection: Collection) -> std::result::Result<Vec<Transaction>, StoreError>;

    /// Overwrite one collection as a whole.
    fn save(
        &self,
        collection: Collection,
        entries: &[Transaction],
    ) -> std::result::Result<(), StoreError>;
}
