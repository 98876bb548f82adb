//! Request dispatch to the backend.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde_json::Value;

use tollgate_backends::{Backend, Operation};

use crate::error::ApiError;
use crate::server::AppState;

/// `POST /api/v1/chat/completions`
pub async fn completion(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Operation::Completion, payload).await
}

/// `POST /api/v1/embeddings`
pub async fn embedding(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Operation::Embedding, payload).await
}

/// `POST /api/v1/images/generations`
pub async fn image_generation(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    run(&state, Operation::ImageGeneration, payload).await
}

async fn run(
    state: &AppState,
    operation: Operation,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(mut payload) =
        payload.map_err(|rejection| ApiError::MalformedPayload(rejection.body_text()))?;

    strip_unsupported(state.backend.as_ref(), operation, &mut payload);

    tracing::debug!(
        operation = %operation,
        backend = state.backend.name(),
        "dispatching request"
    );
    let response = state.backend.invoke(operation, payload).await?;
    Ok(Json(response))
}

/// Drop top-level fields the backend cannot accept for this operation.
fn strip_unsupported(backend: &dyn Backend, operation: Operation, payload: &mut Value) {
    let Some(object) = payload.as_object_mut() else {
        return;
    };
    for field in backend.unsupported_fields(operation).iter().copied() {
        if object.remove(field).is_some() {
            tracing::debug!(operation = %operation, field, "dropped field unsupported by backend");
        }
    }
}
