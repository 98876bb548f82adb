//! Bearer authentication middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use tollgate_core::auth::AuthError;

use crate::error::ApiError;
use crate::server::AppState;

/// Require a valid bearer credential before a request reaches its handler.
///
/// Applied once per protected route via `route_layer`. The store is
/// consulted on every request; nothing is cached, so revocations and
/// rotations apply immediately. All failure modes answer with the same
/// generic 401. A store fault is logged, never distinguished on the wire.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(token) = bearer_token(request.headers()) else {
        tracing::debug!("request without usable bearer token");
        return Err(ApiError::InvalidApiKey);
    };

    match state.gate.authenticate(token).await {
        Ok(()) => Ok(next.run(request).await),
        Err(AuthError::InvalidCredential) => Err(ApiError::InvalidApiKey),
        Err(AuthError::StoreUnavailable(err)) => {
            tracing::error!(error = %err, "secret store fault during authentication; failing closed");
            Err(ApiError::InvalidApiKey)
        }
    }
}

/// Extract the token from `Authorization: Bearer <token>`.
///
/// The scheme is case-insensitive. The token is everything after the first
/// space, verbatim; no trimming, so a token with stray whitespace is simply
/// a different token.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = header.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    (!token.is_empty()).then_some(token)
}
