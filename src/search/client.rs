//! HTTP client for the offers search index.
//!
//! A thin wrapper over the engine's REST API: batched upserts, batched
//! deletes by externalized id, and a full clear. The client performs no
//! chunking of its own; callers are responsible for keeping batches
//! within the configured page sizes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SyncConfig;

use super::documents::OfferDocument;

/// Errors that can occur talking to the search engine.
#[derive(Debug, Error)]
pub enum SearchError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The engine rejected the request.
    #[error("Search engine error ({code}): {message}")]
    ApiError { code: u16, message: String },

    /// The engine's response could not be decoded.
    #[error("Failed to parse search engine response: {0}")]
    ParseError(String),

    /// A request body could not be built.
    #[error("Failed to serialize request: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Write operations on the offers index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Adds or replaces the given documents, keyed by `objectID`.
    async fn upsert_batch(&self, documents: &[OfferDocument]) -> Result<(), SearchError>;

    /// Deletes the documents with the given externalized ids.
    async fn delete_batch(&self, external_ids: &[String]) -> Result<(), SearchError>;

    /// Removes every document from the index.
    async fn clear_all(&self) -> Result<(), SearchError>;
}

/// REST client for an Algolia-style index.
pub struct AlgoliaClient {
    /// Base URL for the API.
    api_base: String,
    /// Application id sent with every request.
    application_id: String,
    /// Write API key sent with every request.
    api_key: String,
    /// Name of the offers index.
    index_name: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl AlgoliaClient {
    /// Create a new client with explicit configuration.
    ///
    /// The API base defaults to the engine's standard per-application
    /// host; use [`with_api_base`](Self::with_api_base) to point at a
    /// test server.
    pub fn new(
        application_id: impl Into<String>,
        api_key: impl Into<String>,
        index_name: impl Into<String>,
    ) -> Self {
        let application_id = application_id.into();
        Self {
            api_base: format!("https://{}.algolia.net", application_id),
            application_id,
            api_key: api_key.into(),
            index_name: index_name.into(),
            http_client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Create a client from the pipeline configuration.
    pub fn from_config(config: &SyncConfig) -> Self {
        let mut client = Self::new(
            config.algolia_application_id.clone(),
            config.algolia_api_key.clone(),
            config.algolia_offers_index_name.clone(),
        );
        if let Some(ref base) = config.algolia_api_base {
            client.api_base = base.clone();
        }
        client
    }

    /// Builder method to override the API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Get the name of the offers index.
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    fn index_url(&self, suffix: &str) -> String {
        format!("{}/1/indexes/{}/{}", self.api_base, self.index_name, suffix)
    }

    async fn post(&self, url: &str, payload: &impl Serialize) -> Result<(), SearchError> {
        let http_response = self
            .http_client
            .post(url)
            .header("X-Algolia-Application-Id", &self.application_id)
            .header("X-Algolia-API-Key", &self.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| SearchError::RequestFailed(e.to_string()))?;

        let status = http_response.status();

        if !status.is_success() {
            let code = status.as_u16();

            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());

            // Try to parse as structured error
            if let Ok(error_response) = serde_json::from_str::<ApiErrorResponse>(&error_text) {
                return Err(SearchError::ApiError {
                    code,
                    message: error_response.message,
                });
            }

            return Err(SearchError::ApiError {
                code,
                message: error_text,
            });
        }

        let api_response: ApiTaskResponse = http_response
            .json()
            .await
            .map_err(|e| SearchError::ParseError(e.to_string()))?;

        tracing::debug!(task_id = api_response.task_id, url, "Search engine accepted write");

        Ok(())
    }
}

#[async_trait]
impl SearchIndex for AlgoliaClient {
    async fn upsert_batch(&self, documents: &[OfferDocument]) -> Result<(), SearchError> {
        if documents.is_empty() {
            return Ok(());
        }

        let requests = documents
            .iter()
            .map(|document| {
                Ok(BatchRequest {
                    action: "updateObject",
                    body: serde_json::to_value(document)?,
                })
            })
            .collect::<Result<Vec<_>, serde_json::Error>>()?;

        self.post(&self.index_url("batch"), &BatchPayload { requests })
            .await
    }

    async fn delete_batch(&self, external_ids: &[String]) -> Result<(), SearchError> {
        if external_ids.is_empty() {
            return Ok(());
        }

        let requests = external_ids
            .iter()
            .map(|object_id| BatchRequest {
                action: "deleteObject",
                body: serde_json::json!({ "objectID": object_id }),
            })
            .collect();

        self.post(&self.index_url("batch"), &BatchPayload { requests })
            .await
    }

    async fn clear_all(&self) -> Result<(), SearchError> {
        self.post(&self.index_url("clear"), &serde_json::json!({}))
            .await
    }
}

/// Internal request structure for the engine's batch endpoint.
#[derive(Debug, Serialize)]
struct BatchPayload {
    requests: Vec<BatchRequest>,
}

/// One operation within a batch request.
#[derive(Debug, Serialize)]
struct BatchRequest {
    action: &'static str,
    body: serde_json::Value,
}

/// Internal response structure for write acknowledgements.
#[derive(Debug, Deserialize)]
struct ApiTaskResponse {
    #[serde(rename = "taskID", default)]
    task_id: u64,
}

/// Internal error structure returned by the engine.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: String,
}
