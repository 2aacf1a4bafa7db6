//! Ledger entry model.

mod transaction_model;

pub use transaction_model::Transaction;
