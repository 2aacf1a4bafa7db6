//! Wire types for the record store API.

use serde::{Deserialize, Serialize};

/// Successful create response; `id` becomes the entry's external id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedRecord {
    pub id: String,
}

/// Error response body of the record store.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
}
