//! Remote record store synchronization: the HTTP client that mirrors
//! ledger entries into a Notion database.

mod client;
mod error;
mod types;

pub use client::{NotionClient, NotionConfig};
pub use error::{RemoteSyncError, Result};
pub use types::{ApiErrorResponse, CreatedRecord};
