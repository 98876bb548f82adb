//! HTTP secret store client.
//!
//! Talks to a remote key-value secret service over two endpoints:
//!
//! - `GET {base}/v1/secrets?prefix={prefix}` → `{"names": [...]}`
//! - `GET {base}/v1/secrets/{name}?decrypt={bool}` → `{"value": "..."}`
//!
//! A 404 on fetch maps to [`SecretStoreError::NotFound`]; connection
//! failures, timeouts, other non-2xx answers, and undecodable bodies all map
//! to [`SecretStoreError::Unavailable`]. Decryption of values encrypted at
//! rest happens server-side; names must be URL-path-safe.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use zeroize::Zeroize;

use super::{Credential, SecretStore, SecretStoreError};

/// Default per-call timeout for store requests.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Client for a remote secret store.
pub struct HttpSecretStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: Option<Credential>,
    timeout: Duration,
    decrypt: bool,
}

#[derive(Deserialize)]
struct NamesPayload {
    names: Vec<String>,
}

#[derive(Deserialize)]
struct ValuePayload {
    value: String,
}

impl HttpSecretStore {
    /// Create a client for the store at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
            auth_token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            decrypt: true,
        }
    }

    /// Authenticate to the store itself with a bearer token.
    #[must_use]
    pub fn with_auth_token(mut self, token: Credential) -> Self {
        self.auth_token = Some(token);
        self
    }

    /// Bound each store call by `timeout`.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Ask the store to decrypt values server-side (on by default).
    #[must_use]
    pub fn with_decrypt(mut self, decrypt: bool) -> Self {
        self.decrypt = decrypt;
        self
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .client
            .get(format!("{}{path}", self.base_url))
            .timeout(self.timeout);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token.expose());
        }
        request
    }
}

fn unavailable(context: &str, err: &reqwest::Error) -> SecretStoreError {
    if err.is_timeout() {
        SecretStoreError::Unavailable(format!("{context}: timed out"))
    } else {
        SecretStoreError::Unavailable(format!("{context}: {err}"))
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn list_names(&self, prefix: &str) -> Result<Vec<String>, SecretStoreError> {
        let response = self
            .get("/v1/secrets")
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(|e| unavailable("listing secret names", &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SecretStoreError::Unavailable(format!(
                "listing secret names: store answered {status}"
            )));
        }

        let payload: NamesPayload = response
            .json()
            .await
            .map_err(|e| unavailable("decoding name list", &e))?;
        Ok(payload.names)
    }

    async fn fetch(&self, name: &str) -> Result<Credential, SecretStoreError> {
        let decrypt = if self.decrypt { "true" } else { "false" };
        let response = self
            .get(&format!("/v1/secrets/{name}"))
            .query(&[("decrypt", decrypt)])
            .send()
            .await
            .map_err(|e| unavailable("fetching secret", &e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(SecretStoreError::NotFound(name.to_string()));
        }
        if !status.is_success() {
            return Err(SecretStoreError::Unavailable(format!(
                "fetching secret: store answered {status}"
            )));
        }

        let mut raw = response
            .text()
            .await
            .map_err(|e| unavailable("reading secret body", &e))?;
        let payload: Result<ValuePayload, _> = serde_json::from_str(&raw);
        // The raw body carried the plaintext value; scrub it once parsed.
        raw.zeroize();

        match payload {
            Ok(payload) => Ok(Credential::new(payload.value)),
            Err(err) => Err(SecretStoreError::Unavailable(format!(
                "decoding secret body: {err}"
            ))),
        }
    }
}
