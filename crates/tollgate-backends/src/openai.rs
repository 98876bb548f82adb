//! OpenAI-compatible backend.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::traits::{Backend, BackendError, Operation};
use tollgate_core::secrets::Credential;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Pass-through client for an OpenAI-compatible API.
///
/// Payloads go upstream as received (minus stripped fields) and responses
/// come back verbatim, success or error.
pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    api_key: Option<Credential>,
    org_id: Option<String>,
    timeout: Duration,
}

impl OpenAiBackend {
    /// Create a backend against the public `OpenAI` API.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    /// Create a backend against a custom base URL (Azure or compatible APIs).
    #[must_use]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            api_key: None,
            org_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set the upstream API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: Credential) -> Self {
        self.api_key = Some(api_key);
        self
    }

    /// Set the organization ID header value.
    #[must_use]
    pub fn with_org_id(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Set the per-call timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    const fn endpoint(operation: Operation) -> &'static str {
        match operation {
            Operation::Completion => "/v1/chat/completions",
            Operation::Embedding => "/v1/embeddings",
            Operation::ImageGeneration => "/v1/images/generations",
        }
    }

    async fn post(&self, operation: Operation, payload: &Value) -> Result<Value, BackendError> {
        let url = format!("{}{}", self.base_url, Self::endpoint(operation));

        let mut request = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");

        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {}", key.expose()));
        }
        if let Some(org) = &self.org_id {
            request = request.header("OpenAI-Organization", org);
        }

        let response = request.json(payload).send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body: Option<Value> = response.json().await.ok();
            tracing::debug!(operation = %operation, status, "upstream answered with an error");
            return Err(BackendError::Api { status, body });
        }

        Ok(response.json().await?)
    }
}

impl Default for OpenAiBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn unsupported_fields(&self, operation: Operation) -> &[&str] {
        match operation {
            Operation::Completion | Operation::Embedding => &[],
            // The images endpoint has no seed parameter; requests carrying
            // one are rejected upstream.
            Operation::ImageGeneration => &["seed"],
        }
    }

    async fn completion(&self, payload: Value) -> Result<Value, BackendError> {
        self.post(Operation::Completion, &payload).await
    }

    async fn embedding(&self, payload: Value) -> Result<Value, BackendError> {
        self.post(Operation::Embedding, &payload).await
    }

    async fn image_generation(&self, payload: Value) -> Result<Value, BackendError> {
        self.post(Operation::ImageGeneration, &payload).await
    }
}
