//! Config command - show and validate configuration.

use anyhow::Result;
use tollgate_core::Config;

use crate::ui;

/// Config command arguments.
#[derive(Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Show full config.
    pub show: bool,
    /// Validate configuration.
    pub validate: bool,
}

/// Run the config command.
pub fn run_config(args: ConfigArgs, config: Config) -> Result<()> {
    if args.validate {
        return validate_config(&config);
    }

    if args.show {
        return show_config(&config);
    }

    // Default: show full config
    show_config(&config)
}

/// Validate the effective configuration.
fn validate_config(config: &Config) -> Result<()> {
    ui::header("Validating Configuration");

    match config.validate() {
        Ok(()) => {
            ui::success("Configuration is valid");
            if config.store_url().is_err() {
                ui::warning(
                    "No secret store URL configured; 'tollgate run' will refuse to start",
                );
            }
        }
        Err(e) => {
            ui::error(&format!("Validation failed: {e}"));
        }
    }

    Ok(())
}

/// Print the effective configuration with secrets redacted.
fn show_config(config: &Config) -> Result<()> {
    ui::header("Effective Configuration");
    println!("{}", serde_json::to_string_pretty(&redacted(config))?);
    Ok(())
}

/// A copy of the config safe to print: store and backend secrets replaced.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.secret_store.auth_token.is_some() {
        config.secret_store.auth_token = Some("[REDACTED]".to_string());
    }
    if config.backend.api_key.is_some() {
        config.backend.api_key = Some("[REDACTED]".to_string());
    }
    config
}
