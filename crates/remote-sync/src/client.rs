//! HTTP client for the Notion records API.
//!
//! One ledger entry maps to one page in a configured database; deletion is
//! Notion-style archival. Every call is a single attempt — retry policy
//! belongs to the ledger engine, not this client.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use kakeibo_core::remote::{PushError, RemoteLedgerClient};
use kakeibo_core::transactions::Transaction;

use crate::error::{RemoteSyncError, Result};
use crate::types::{ApiErrorResponse, CreatedRecord};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Public API host.
const DEFAULT_BASE_URL: &str = "https://api.notion.com";
/// Pinned API revision; newer revisions change the page property schema.
const NOTION_VERSION: &str = "2021-05-13";

/// Connection settings for the record store.
///
/// The integration token and target database come from the settings
/// surface; `base_url` exists so tests can point the client at a local
/// server.
#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub base_url: String,
    pub api_key: String,
    pub database_id: String,
}

impl NotionConfig {
    pub fn new(api_key: impl Into<String>, database_id: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            database_id: database_id.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

/// Client for the Notion records API.
#[derive(Debug, Clone)]
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    database_id: String,
}

impl NotionClient {
    pub fn new(config: NotionConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            database_id: config.database_id,
        }
    }

    /// Create headers for an API request.
    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let auth_value = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|_| RemoteSyncError::auth("Invalid API token format"))?;
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert("Notion-Version", HeaderValue::from_static(NOTION_VERSION));

        Ok(headers)
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(RemoteSyncError::api(
                    status.as_u16(),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(RemoteSyncError::api(
                status.as_u16(),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            RemoteSyncError::api(status.as_u16(), format!("Failed to parse response: {}", e))
        })
    }

    /// The page property map for one ledger entry.
    fn entry_properties(&self, entry: &Transaction) -> serde_json::Value {
        serde_json::json!({
            "Amount": { "number": entry.amount },
            "Memo": { "rich_text": [{ "text": { "content": entry.memo } }] },
            "Date": { "date": { "start": entry.date.to_rfc3339() } },
            "Tags": {
                "multi_select": entry
                    .tags
                    .iter()
                    .map(|tag| serde_json::json!({ "name": tag }))
                    .collect::<Vec<_>>()
            },
            "IsSubscription": { "checkbox": entry.is_recurring },
            "PaymentCycle": { "number": entry.period_months.unwrap_or(0) },
            "IsIncome": { "checkbox": entry.is_income },
        })
    }

    /// Create one page for a ledger entry, returning its page id.
    ///
    /// POST /v1/pages
    pub async fn create_record(&self, entry: &Transaction) -> Result<String> {
        let url = format!("{}/v1/pages", self.base_url);
        let body = serde_json::json!({
            "parent": { "database_id": self.database_id },
            "properties": self.entry_properties(entry),
        });
        debug!("Creating record for entry {}", entry.id);

        let response = self
            .client
            .post(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await?;

        let created: CreatedRecord = Self::parse_response(response).await?;
        Ok(created.id)
    }

    /// Archive a previously created page.
    ///
    /// PATCH /v1/pages/{pageId}
    pub async fn archive_record(&self, external_id: &str) -> Result<()> {
        let url = format!("{}/v1/pages/{}", self.base_url, external_id);
        debug!("Archiving remote record {}", external_id);

        let response = self
            .client
            .patch(&url)
            .headers(self.headers()?)
            .json(&serde_json::json!({ "archived": true }))
            .send()
            .await?;

        let _: CreatedRecord = Self::parse_response(response).await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteLedgerClient for NotionClient {
    async fn create_entry(&self, entry: &Transaction) -> std::result::Result<String, PushError> {
        self.create_record(entry).await.map_err(Into::into)
    }

    async fn archive_entry(&self, external_id: &str) -> std::result::Result<(), PushError> {
        self.archive_record(external_id).await.map_err(Into::into)
    }
}
