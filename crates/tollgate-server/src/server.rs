//! Gateway server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::{json, Value};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use tollgate_backends::Backend;
use tollgate_core::auth::AuthGate;

use crate::{auth, dispatch};

/// Server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configured bind address did not parse.
    #[error("Invalid address: {0}")]
    Address(String),

    /// Listener or serve failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_address: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable permissive CORS.
    pub cors: bool,
    /// Per-request deadline.
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8000,
            cors: true,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Gate checking bearer credentials against the secret store.
    pub gate: Arc<AuthGate>,
    /// Backend validated requests dispatch to.
    pub backend: Arc<dyn Backend>,
}

/// The gateway server.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Assemble a server from its parts.
    #[must_use]
    pub fn new(config: ServerConfig, gate: Arc<AuthGate>, backend: Arc<dyn Backend>) -> Self {
        Self {
            config,
            state: AppState { gate, backend },
        }
    }

    /// The router this server serves. Useful for in-process testing.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(&self.config, self.state.clone())
    }

    /// Bind and serve until a shutdown signal arrives.
    ///
    /// # Errors
    ///
    /// Returns error if the address does not parse or the listener fails.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.bind_address, self.config.port)
            .parse()
            .map_err(|e| {
                ServerError::Address(format!(
                    "{}:{}: {e}",
                    self.config.bind_address, self.config.port
                ))
            })?;

        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Gateway listening on http://{}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Gateway stopped");
        Ok(())
    }
}

fn build_router(config: &ServerConfig, state: AppState) -> Router {
    // Every operation route sits behind the credential gate; /health does not.
    let operations = Router::new()
        .route("/api/v1/chat/completions", post(dispatch::completion))
        .route("/api/v1/embeddings", post(dispatch::embedding))
        .route(
            "/api/v1/images/generations",
            post(dispatch::image_generation),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_api_key,
        ));

    let mut router = Router::new()
        .route("/health", get(health))
        .merge(operations)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(config.request_timeout));

    if config.cors {
        router = router.layer(CorsLayer::very_permissive());
    }

    router
}

/// Liveness probe.
async fn health() -> Json<Value> {
    Json(json!({ "status": "I'm alive!" }))
}

/// Resolves when the process receives a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix both signals are handled so container orchestrators trigger a
/// clean stop. On non-Unix only Ctrl-C (SIGINT) is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let sigterm = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c  => {}
        _ = sigterm => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tollgate_backends::{BackendError, Operation};
    use tollgate_core::secrets::{
        Credential, MemorySecretStore, SecretStore, SecretStoreError,
    };
    use tower::ServiceExt;

    const TEST_PREFIX: &str = "TollgateApiKey";

    enum Scripted {
        Ok(Value),
        Api { status: u16, body: Value },
        Timeout,
    }

    /// Backend fixture that records every call and answers from a script.
    struct RecordingBackend {
        calls: Mutex<Vec<(Operation, Value)>>,
        script: Scripted,
        drop_image_fields: &'static [&'static str],
    }

    impl RecordingBackend {
        fn ok(response: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Scripted::Ok(response),
                drop_image_fields: &[],
            }
        }

        fn api_error(status: u16, body: Value) -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Scripted::Api { status, body },
                drop_image_fields: &[],
            }
        }

        fn timing_out() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                script: Scripted::Timeout,
                drop_image_fields: &[],
            }
        }

        fn with_image_field_drops(mut self, fields: &'static [&'static str]) -> Self {
            self.drop_image_fields = fields;
            self
        }

        fn recorded(&self) -> Vec<(Operation, Value)> {
            self.calls.lock().unwrap().clone()
        }

        fn respond(&self, operation: Operation, payload: Value) -> Result<Value, BackendError> {
            self.calls.lock().unwrap().push((operation, payload));
            match &self.script {
                Scripted::Ok(value) => Ok(value.clone()),
                Scripted::Api { status, body } => Err(BackendError::Api {
                    status: *status,
                    body: Some(body.clone()),
                }),
                Scripted::Timeout => Err(BackendError::Timeout),
            }
        }
    }

    #[async_trait]
    impl Backend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        fn unsupported_fields(&self, operation: Operation) -> &[&str] {
            match operation {
                Operation::ImageGeneration => self.drop_image_fields,
                _ => &[],
            }
        }

        async fn completion(&self, payload: Value) -> Result<Value, BackendError> {
            self.respond(Operation::Completion, payload)
        }

        async fn embedding(&self, payload: Value) -> Result<Value, BackendError> {
            self.respond(Operation::Embedding, payload)
        }

        async fn image_generation(&self, payload: Value) -> Result<Value, BackendError> {
            self.respond(Operation::ImageGeneration, payload)
        }
    }

    /// Store fixture that fails every call.
    struct OutageStore;

    #[async_trait]
    impl SecretStore for OutageStore {
        async fn list_names(&self, _prefix: &str) -> Result<Vec<String>, SecretStoreError> {
            Err(SecretStoreError::Unavailable("store is down".to_string()))
        }

        async fn fetch(&self, _name: &str) -> Result<Credential, SecretStoreError> {
            Err(SecretStoreError::Unavailable("store is down".to_string()))
        }
    }

    fn router_for(store: Arc<dyn SecretStore>, backend: Arc<RecordingBackend>) -> Router {
        let state = AppState {
            gate: Arc::new(AuthGate::new(store, TEST_PREFIX)),
            backend,
        };
        build_router(&ServerConfig::default(), state)
    }

    /// A router with one registered credential, `sk-valid`.
    async fn fixture(
        backend: RecordingBackend,
    ) -> (Arc<MemorySecretStore>, Arc<RecordingBackend>, Router) {
        let store = Arc::new(MemorySecretStore::new());
        store.insert("TollgateApiKey/primary", "sk-valid").await;
        let backend = Arc::new(backend);
        let router = router_for(store.clone(), backend.clone());
        (store, backend, router)
    }

    fn post_json(uri: &str, token: Option<&str>, body: &Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 8000);
        assert_eq!(config.bind_address, "0.0.0.0");
        assert!(config.cors);
        assert_eq!(config.request_timeout, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn health_answers_without_credentials() {
        let (_, _, router) = fixture(RecordingBackend::ok(json!({}))).await;

        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "status": "I'm alive!" }));
    }

    #[tokio::test]
    async fn operations_require_credentials() {
        let (_, backend, router) = fixture(RecordingBackend::ok(json!({}))).await;

        for uri in [
            "/api/v1/chat/completions",
            "/api/v1/embeddings",
            "/api/v1/images/generations",
        ] {
            let response = router
                .clone()
                .oneshot(post_json(uri, None, &json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(
                body_json(response).await,
                json!({ "detail": "Invalid API Key" }),
                "{uri}"
            );
        }
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn wrong_credentials_are_denied() {
        let (_, backend, router) = fixture(RecordingBackend::ok(json!({}))).await;

        // Case changes and stray whitespace are different tokens.
        for token in ["sk-wrong", "SK-VALID", "sk-valid ", " sk-valid"] {
            let response = router
                .clone()
                .oneshot(post_json("/api/v1/chat/completions", Some(token), &json!({})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{token:?}");
            assert_eq!(
                body_json(response).await,
                json!({ "detail": "Invalid API Key" }),
                "{token:?}"
            );
        }
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn valid_credential_reaches_the_backend() {
        let (_, backend, router) =
            fixture(RecordingBackend::ok(json!({ "id": "chatcmpl-1" }))).await;
        let payload = json!({ "model": "gpt-4o", "messages": [] });

        let response = router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &payload,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "id": "chatcmpl-1" }));
        assert_eq!(backend.recorded(), vec![(Operation::Completion, payload)]);
    }

    #[tokio::test]
    async fn routes_map_to_their_operations() {
        let (_, backend, router) = fixture(RecordingBackend::ok(json!({}))).await;
        let embed = json!({ "input": "hello" });
        let image = json!({ "prompt": "a fox" });

        router
            .clone()
            .oneshot(post_json("/api/v1/embeddings", Some("sk-valid"), &embed))
            .await
            .unwrap();
        router
            .oneshot(post_json(
                "/api/v1/images/generations",
                Some("sk-valid"),
                &image,
            ))
            .await
            .unwrap();

        assert_eq!(
            backend.recorded(),
            vec![
                (Operation::Embedding, embed),
                (Operation::ImageGeneration, image),
            ]
        );
    }

    #[tokio::test]
    async fn image_payloads_lose_unsupported_fields() {
        let (_, backend, router) = fixture(
            RecordingBackend::ok(json!({ "created": 1 })).with_image_field_drops(&["seed"]),
        )
        .await;

        let payload = json!({ "prompt": "a fox", "size": "1024x1024", "seed": 7 });
        let response = router
            .oneshot(post_json(
                "/api/v1/images/generations",
                Some("sk-valid"),
                &payload,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            backend.recorded(),
            vec![(
                Operation::ImageGeneration,
                json!({ "prompt": "a fox", "size": "1024x1024" }),
            )]
        );
    }

    #[tokio::test]
    async fn completion_payloads_keep_their_fields() {
        let (_, backend, router) = fixture(
            RecordingBackend::ok(json!({})).with_image_field_drops(&["seed"]),
        )
        .await;

        let payload = json!({ "model": "gpt-4o", "seed": 7 });
        router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &payload,
            ))
            .await
            .unwrap();

        assert_eq!(backend.recorded(), vec![(Operation::Completion, payload)]);
    }

    #[tokio::test]
    async fn malformed_bodies_are_rejected() {
        let (_, backend, router) = fixture(RecordingBackend::ok(json!({}))).await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/chat/completions")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer sk-valid")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert!(body["detail"].as_str().is_some_and(|s| !s.is_empty()));
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn empty_credential_set_denies_everything() {
        let store = Arc::new(MemorySecretStore::new());
        let backend = Arc::new(RecordingBackend::ok(json!({})));
        let router = router_for(store, backend.clone());

        let response = router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Invalid API Key" })
        );
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn store_outage_fails_closed() {
        let backend = Arc::new(RecordingBackend::ok(json!({})));
        let router = router_for(Arc::new(OutageStore), backend.clone());

        let response = router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &json!({}),
            ))
            .await
            .unwrap();

        // Same generic denial as a bad key; the fault stays server-side.
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "Invalid API Key" })
        );
        assert!(backend.recorded().is_empty());
    }

    #[tokio::test]
    async fn upstream_error_passes_through() {
        let error_body = json!({ "error": { "message": "Rate limit reached" } });
        let (_, _, router) =
            fixture(RecordingBackend::api_error(429, error_body.clone())).await;

        let response = router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &json!({}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body_json(response).await, error_body);
    }

    #[tokio::test]
    async fn upstream_timeout_maps_to_gateway_timeout() {
        let (_, _, router) = fixture(RecordingBackend::timing_out()).await;

        let response = router
            .oneshot(post_json("/api/v1/embeddings", Some("sk-valid"), &json!({})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(
            body_json(response).await,
            json!({ "detail": "upstream timed out" })
        );
    }

    #[tokio::test]
    async fn rotation_applies_to_the_next_request() {
        let (store, _, router) = fixture(RecordingBackend::ok(json!({}))).await;

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        store.remove("TollgateApiKey/primary").await;
        store.insert("TollgateApiKey/primary", "sk-rotated").await;

        let response = router
            .clone()
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-valid"),
                &json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(post_json(
                "/api/v1/chat/completions",
                Some("sk-rotated"),
                &json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn cors_preflight_is_answered_when_enabled() {
        let (_, _, router) = fixture(RecordingBackend::ok(json!({}))).await;

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/chat/completions")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn cors_can_be_disabled() {
        let store = Arc::new(MemorySecretStore::new());
        let backend = Arc::new(RecordingBackend::ok(json!({})));
        let state = AppState {
            gate: Arc::new(AuthGate::new(store, TEST_PREFIX)),
            backend,
        };
        let config = ServerConfig {
            cors: false,
            ..ServerConfig::default()
        };
        let router = build_router(&config, state);

        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/v1/chat/completions")
            .header(header::ORIGIN, "https://example.com")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();

        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn invalid_bind_address_errors() {
        let store = Arc::new(MemorySecretStore::new());
        let backend = Arc::new(RecordingBackend::ok(json!({})));
        let config = ServerConfig {
            bind_address: "not-an-address".to_string(),
            ..ServerConfig::default()
        };
        let server = Server::new(
            config,
            Arc::new(AuthGate::new(store, TEST_PREFIX)),
            backend,
        );

        let err = server.run().await.unwrap_err();
        assert!(matches!(err, ServerError::Address(_)));
    }
}
