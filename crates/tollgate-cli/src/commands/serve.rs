//! Serve command - run the gateway server.

use std::sync::Arc;

use anyhow::Result;
use tollgate_backends::OpenAiBackend;
use tollgate_core::{AuthGate, Config, Credential, HttpSecretStore};
use tollgate_server::{Server, ServerConfig};

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port to listen on.
    pub port: Option<u16>,
    /// Bind address.
    pub bind: Option<String>,
}

/// Run the gateway server until interrupted.
pub async fn run_serve(args: ServeArgs, config: Config) -> Result<()> {
    config.validate()?;
    let store_url = config.store_url()?;

    let mut store = HttpSecretStore::new(store_url)
        .with_timeout(config.secret_store.timeout())
        .with_decrypt(config.secret_store.decrypt);
    if let Some(token) = &config.secret_store.auth_token {
        store = store.with_auth_token(Credential::new(token.clone()));
    }
    let gate = AuthGate::new(Arc::new(store), config.secret_store.key_prefix.clone());

    let mut backend = OpenAiBackend::with_base_url(config.backend.base_url.clone())
        .with_timeout(config.backend.timeout());
    if let Some(key) = &config.backend.api_key {
        backend = backend.with_api_key(Credential::new(key.clone()));
    } else {
        ui::warning("No backend API key configured; upstream calls may be rejected");
    }
    if let Some(org) = &config.backend.org_id {
        backend = backend.with_org_id(org.clone());
    }

    let port = args.port.unwrap_or(config.server.port);
    let bind_address = args
        .bind
        .unwrap_or_else(|| config.server.mode.address().to_string());

    ui::header("Starting Tollgate");
    ui::kv("Address", &format!("{bind_address}:{port}"));
    ui::kv("Key prefix", &config.secret_store.key_prefix);
    ui::kv("Backend", &config.backend.base_url);
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    let server_config = ServerConfig {
        bind_address,
        port,
        cors: config.server.cors,
        request_timeout: config.server.timeout(),
    };
    Server::new(server_config, Arc::new(gate), Arc::new(backend))
        .run()
        .await?;

    Ok(())
}
