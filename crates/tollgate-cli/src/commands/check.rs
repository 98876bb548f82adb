//! Check command - verify configuration, secret store, and gateway health.

use std::time::Duration;

use anyhow::Result;
use tollgate_core::{Config, Credential, HttpSecretStore, SecretStore};

use crate::ui::{self, HealthStatus};

/// Check command arguments.
#[derive(Debug, Clone, Default)]
pub struct CheckArgs {
    /// Probe the store and a running gateway for connectivity.
    pub deep: bool,
}

/// Run the check command.
pub async fn run_check(args: CheckArgs, config: Config) -> Result<()> {
    ui::header("Tollgate Check");

    println!();
    ui::info("Configuration");
    match config.validate() {
        Ok(()) => ui::health_check("Config", HealthStatus::Ok, Some("valid")),
        Err(e) => ui::health_check("Config", HealthStatus::Error, Some(&e.to_string())),
    }

    match config.store_url() {
        Ok(url) => ui::health_check("Secret store", HealthStatus::Ok, Some(url)),
        Err(_) => {
            ui::health_check(
                "Secret store",
                HealthStatus::Error,
                Some("no URL configured"),
            );
            ui::info("  Set secretStore.baseUrl or TOLLGATE_STORE_URL");
        }
    }

    if config.backend.api_key.is_some() {
        ui::health_check("Backend key", HealthStatus::Ok, Some("configured"));
    } else {
        ui::health_check("Backend key", HealthStatus::Warning, Some("not configured"));
    }

    if !args.deep {
        println!();
        ui::info("Run with --deep to probe the store and a running gateway");
        return Ok(());
    }

    println!();
    ui::info("Deep Probe");

    match probe_store(&config).await {
        Ok(detail) => ui::health_check("  Secret store", HealthStatus::Ok, Some(&detail)),
        Err(e) => ui::health_check("  Secret store", HealthStatus::Error, Some(&e)),
    }

    match probe_gateway(config.server.port).await {
        Ok(detail) => ui::health_check("  Gateway", HealthStatus::Ok, Some(&detail)),
        Err(e) => ui::health_check("  Gateway", HealthStatus::Warning, Some(&e)),
    }

    Ok(())
}

/// List credential names under the configured prefix.
///
/// Reports the count only, never names or values.
async fn probe_store(config: &Config) -> Result<String, String> {
    let url = config.store_url().map_err(|e| e.to_string())?;

    let mut store = HttpSecretStore::new(url)
        .with_timeout(config.secret_store.timeout())
        .with_decrypt(config.secret_store.decrypt);
    if let Some(token) = &config.secret_store.auth_token {
        store = store.with_auth_token(Credential::new(token.clone()));
    }

    let names = store
        .list_names(&config.secret_store.key_prefix)
        .await
        .map_err(|e| e.to_string())?;

    Ok(format!(
        "{} credential(s) under '{}'",
        names.len(),
        config.secret_store.key_prefix
    ))
}

/// Probe a locally running gateway's health endpoint.
async fn probe_gateway(port: u16) -> Result<String, String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()
        .map_err(|e| e.to_string())?;

    let resp = client
        .get(format!("http://127.0.0.1:{port}/health"))
        .send()
        .await
        .map_err(|_| format!("not running on port {port}"))?;

    if resp.status().is_success() {
        let body: serde_json::Value = resp.json().await.map_err(|e| e.to_string())?;
        match body.get("status").and_then(|v| v.as_str()) {
            Some(status) => Ok(format!("responding: {status}")),
            None => Ok("responding".to_string()),
        }
    } else {
        Err(format!("health endpoint returned {}", resp.status()))
    }
}
