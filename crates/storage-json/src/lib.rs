//! JSON-file persistence for the ledger collections.

mod store;

pub use store::JsonFileStore;
