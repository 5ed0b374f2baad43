//! HTTP client for the Echoline pipeline endpoints, shared by the CLI binaries.

use anyhow::{Context, Result};
use echoline_core::constants::API_PREFIX;
use echoline_core::models::MediaType;
use uuid::Uuid;

const DEFAULT_API_URL: &str = "http://localhost:4000";

pub struct PipelineClient {
    base_url: String,
    service_api_key: Option<String>,
    http: reqwest::Client,
}

impl PipelineClient {
    pub fn new(base_url: impl Into<String>, service_api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_api_key,
            http: reqwest::Client::new(),
        }
    }

    /// Read `ECHOLINE_API_URL` (or `API_URL`) and `SERVICE_API_KEY`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("ECHOLINE_API_URL")
            .or_else(|_| std::env::var("API_URL"))
            .unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::new(base_url, std::env::var("SERVICE_API_KEY").ok())
    }

    /// Trigger one batch and return the `result` object.
    pub async fn run(&self, media_type: MediaType, limit: Option<i64>) -> Result<serde_json::Value> {
        let key = self
            .service_api_key
            .as_deref()
            .context("SERVICE_API_KEY must be set to trigger the pipeline")?;

        let mut query = vec![("media_type", media_type.to_string())];
        if let Some(limit) = limit {
            query.push(("limit", limit.to_string()));
        }

        let response = self
            .http
            .post(format!("{}{}/internal/media-pipeline/run", self.base_url, API_PREFIX))
            .bearer_auth(key)
            .query(&query)
            .send()
            .await
            .context("Failed to reach the Echoline API")?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Unexpected response body (HTTP {})", status))?;

        if !status.is_success() || body["success"] != serde_json::Value::Bool(true) {
            let message = body["error"]
                .as_str()
                .or_else(|| body["details"].as_str())
                .unwrap_or("unknown error");
            anyhow::bail!("Pipeline run failed (HTTP {}): {}", status, message);
        }

        Ok(body["result"].clone())
    }

    /// Fetch the PII-free media status of an owner.
    pub async fn media_status(&self, owner_id: Uuid) -> Result<serde_json::Value> {
        let response = self
            .http
            .get(format!(
                "{}{}/owners/{}/media-status",
                self.base_url, API_PREFIX, owner_id
            ))
            .send()
            .await
            .context("Failed to reach the Echoline API")?
            .error_for_status()
            .context("Status query failed")?;

        response.json().await.context("Unexpected response body")
    }
}

/// Number of failed items in a batch result.
pub fn failed_count(result: &serde_json::Value) -> usize {
    result["failed"].as_array().map_or(0, Vec::len)
}

/// Initialize tracing for CLI binaries.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}
