//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use tollgate_backends::BackendError;

/// Detail line for every denied request, whatever the actual reason.
///
/// Deliberately generic: callers must not be able to tell a wrong key from
/// a missing header or a store outage.
pub const INVALID_API_KEY: &str = "Invalid API Key";

/// Error body shape, `{"detail": ...}`.
#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: String,
}

fn error_body(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            detail: detail.into(),
        }),
    )
        .into_response()
}

/// Errors a request can end with.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Authentication failed, for any reason.
    #[error("invalid API key")]
    InvalidApiKey,

    /// The request body was not valid JSON.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// The backend call failed.
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::InvalidApiKey => error_body(StatusCode::UNAUTHORIZED, INVALID_API_KEY),
            Self::MalformedPayload(detail) => error_body(StatusCode::BAD_REQUEST, detail),
            Self::Backend(err) => backend_response(err),
        }
    }
}

/// Map a backend failure onto the wire.
///
/// Upstream verdicts pass through with their status and body; transport
/// failures become gateway errors with no upstream detail to forward.
fn backend_response(err: BackendError) -> Response {
    match err {
        BackendError::Api { status, body } => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            let body = body.unwrap_or_else(
                || serde_json::json!({ "detail": format!("upstream returned status {status}") }),
            );
            (code, Json(body)).into_response()
        }
        BackendError::Timeout => error_body(StatusCode::GATEWAY_TIMEOUT, "upstream timed out"),
        BackendError::Network(err) => {
            tracing::error!(error = %err, "upstream unreachable");
            error_body(StatusCode::BAD_GATEWAY, "upstream unreachable")
        }
        BackendError::InvalidPayload(detail) => {
            tracing::error!(detail = %detail, "upstream exchange failed");
            error_body(StatusCode::BAD_GATEWAY, "upstream sent an undecodable response")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn denial_is_always_the_same_shape() {
        let response = ApiError::InvalidApiKey.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Invalid API Key" })
        );
    }

    #[tokio::test]
    async fn malformed_payload_keeps_the_decoder_message() {
        let response =
            ApiError::MalformedPayload("expected value at line 1 column 2".to_string())
                .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "expected value at line 1 column 2" })
        );
    }

    #[tokio::test]
    async fn upstream_verdict_passes_through() {
        let upstream = json!({ "error": { "message": "Rate limit reached" } });
        let response = ApiError::from(BackendError::Api {
            status: 429,
            body: Some(upstream.clone()),
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await, upstream);
    }

    #[tokio::test]
    async fn bodyless_upstream_error_gets_a_detail_line() {
        let response = ApiError::from(BackendError::Api {
            status: 503,
            body: None,
        })
        .into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "upstream returned status 503" })
        );
    }

    #[tokio::test]
    async fn out_of_range_upstream_status_becomes_bad_gateway() {
        let response = ApiError::from(BackendError::Api {
            status: 99,
            body: None,
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn upstream_timeout_is_gateway_timeout() {
        let response = ApiError::from(BackendError::Timeout).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "upstream timed out" })
        );
    }

    #[tokio::test]
    async fn undecodable_upstream_response_is_bad_gateway() {
        let response =
            ApiError::from(BackendError::InvalidPayload("bad utf-8".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "upstream sent an undecodable response" })
        );
    }
}
