//! REST Table Store Client
//!
//! HTTP client for a PostgREST-style backend (the `insightdeck-api` server or
//! a compatible hosted one).
//!
//! | operation | request                                         |
//! |-----------|-------------------------------------------------|
//! | select    | `GET    {base}/rest/v1/{table}?col=eq.v&order=col.desc&limit=n` |
//! | insert    | `POST   {base}/rest/v1/{table}` with `Prefer: return=representation` |
//! | update    | `PATCH  {base}/rest/v1/{table}?col=eq.v`          |
//! | delete    | `DELETE {base}/rest/v1/{table}?col=eq.v`          |

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use super::error::{StoreError, StoreResult};
use super::query::Query;
use super::{Table, TableStore};

/// Configuration for the REST store client
#[derive(Debug, Clone)]
pub struct RestConfig {
    /// Backend base URL (e.g., "http://localhost:8083")
    pub base_url: String,
    /// API key sent as `apikey` header and bearer token
    pub api_key: Option<String>,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8083".to_string(),
            api_key: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl RestConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// `TableStore` backed by HTTP requests
pub struct RestStore {
    client: Client,
    config: RestConfig,
}

impl RestStore {
    /// Create a new REST store client
    pub fn new(config: RestConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        Ok(Self { client, config })
    }

    /// Get the current configuration
    pub fn config(&self) -> &RestConfig {
        &self.config
    }

    /// Check if the backend is reachable and healthy
    pub async fn health_check(&self) -> StoreResult<()> {
        let url = format!("{}/health/live", self.base_url());
        let response = self.client.get(&url).send().await?;
        check_status(response).await.map(|_| ())
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url(), table)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

/// Body of a `DELETE` response
#[derive(Debug, Deserialize)]
struct DeleteResponse {
    deleted: u64,
}

/// Error envelope returned by the backend
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Map a non-success response to `StoreError::Status`
async fn check_status(response: Response) -> StoreResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&text)
        .map(|e| e.error.message)
        .unwrap_or(text);

    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl TableStore for RestStore {
    async fn select(&self, table: Table, query: &Query) -> StoreResult<Vec<Value>> {
        let request = self
            .client
            .get(self.table_url(table))
            .query(&query.to_params());

        let response = check_status(self.authorize(request).send().await?).await?;
        let rows: Vec<Value> = response.json().await?;

        tracing::debug!(table = %table, rows = rows.len(), "Selected rows");
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> StoreResult<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);

        let response = check_status(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, table: Table, query: &Query, patch: Value) -> StoreResult<Vec<Value>> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&query.to_params())
            .header("Prefer", "return=representation")
            .json(&patch);

        let response = check_status(self.authorize(request).send().await?).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, table: Table, query: &Query) -> StoreResult<u64> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&query.to_params());

        let response = check_status(self.authorize(request).send().await?).await?;
        let body: DeleteResponse = response.json().await?;
        Ok(body.deleted)
    }
}
