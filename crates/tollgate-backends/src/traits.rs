//! Backend traits.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Backend errors.
#[derive(Error, Debug)]
pub enum BackendError {
    /// Upstream API answered with an error status.
    #[error("API error: status {status}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Decoded error body, when the upstream sent one.
        body: Option<Value>,
    },

    /// Transport failure talking to the upstream.
    #[error("Network error: {0}")]
    Network(reqwest::Error),

    /// The upstream did not answer within the deadline.
    #[error("Upstream timed out")]
    Timeout,

    /// The request could not be sent or the response decoded.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::InvalidPayload(err.to_string())
        } else {
            Self::Network(err)
        }
    }
}

/// The operations a backend can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Chat completion.
    Completion,
    /// Text embedding.
    Embedding,
    /// Image generation.
    ImageGeneration,
}

impl Operation {
    /// Stable identifier, matching the serde form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Completion => "completion",
            Self::Embedding => "embedding",
            Self::ImageGeneration => "image_generation",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A service the gateway dispatches validated requests to.
///
/// Payloads are opaque JSON. The gateway does not model request schemas;
/// the upstream validates them and its verdicts pass through unchanged.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Backend name.
    fn name(&self) -> &str;

    /// Top-level payload fields this backend cannot accept for an operation.
    ///
    /// The dispatcher strips these before invoking, so clients can send one
    /// payload shape to differently-capable backends.
    fn unsupported_fields(&self, operation: Operation) -> &[&str] {
        let _ = operation;
        &[]
    }

    /// Run a chat completion.
    async fn completion(&self, payload: Value) -> Result<Value, BackendError>;

    /// Compute embeddings.
    async fn embedding(&self, payload: Value) -> Result<Value, BackendError>;

    /// Generate images.
    async fn image_generation(&self, payload: Value) -> Result<Value, BackendError>;

    /// Route an operation to the matching method.
    async fn invoke(&self, operation: Operation, payload: Value) -> Result<Value, BackendError> {
        match operation {
            Operation::Completion => self.completion(payload).await,
            Operation::Embedding => self.embedding(payload).await,
            Operation::ImageGeneration => self.image_generation(payload).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    struct EchoBackend;

    #[async_trait]
    impl Backend for EchoBackend {
        fn name(&self) -> &str {
            "echo"
        }

        async fn completion(&self, payload: Value) -> Result<Value, BackendError> {
            Ok(json!({ "op": "completion", "echo": payload }))
        }

        async fn embedding(&self, payload: Value) -> Result<Value, BackendError> {
            Ok(json!({ "op": "embedding", "echo": payload }))
        }

        async fn image_generation(&self, payload: Value) -> Result<Value, BackendError> {
            Ok(json!({ "op": "image_generation", "echo": payload }))
        }
    }

    #[test]
    fn test_operation_identifiers() {
        assert_eq!(Operation::Completion.as_str(), "completion");
        assert_eq!(Operation::Embedding.as_str(), "embedding");
        assert_eq!(Operation::ImageGeneration.as_str(), "image_generation");
        assert_eq!(Operation::ImageGeneration.to_string(), "image_generation");
    }

    #[test]
    fn test_operation_serde_matches_identifiers() {
        for op in [
            Operation::Completion,
            Operation::Embedding,
            Operation::ImageGeneration,
        ] {
            let encoded = serde_json::to_value(op).unwrap();
            assert_eq!(encoded, json!(op.as_str()));
        }
    }

    #[test]
    fn test_unsupported_fields_default_is_empty() {
        let backend = EchoBackend;
        assert!(backend.unsupported_fields(Operation::Completion).is_empty());
        assert!(backend
            .unsupported_fields(Operation::ImageGeneration)
            .is_empty());
    }

    #[tokio::test]
    async fn test_invoke_routes_to_the_matching_method() {
        let backend = EchoBackend;

        for op in [
            Operation::Completion,
            Operation::Embedding,
            Operation::ImageGeneration,
        ] {
            let result = backend.invoke(op, json!({ "n": 1 })).await.unwrap();
            assert_eq!(result["op"], json!(op.as_str()));
            assert_eq!(result["echo"], json!({ "n": 1 }));
        }
    }
}
