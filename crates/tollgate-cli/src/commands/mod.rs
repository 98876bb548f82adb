//! CLI command implementations.

pub mod check;
pub mod config;
pub mod serve;

pub use check::run_check;
pub use config::run_config;
pub use serve::run_serve;

use std::path::Path;

use anyhow::Result;
use tollgate_core::Config;

use crate::ui;

/// Load configuration from an explicit path or the default location, then
/// apply `TOLLGATE_*` environment overrides on top.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)?,
        None => {
            if !Config::default_path().exists() {
                ui::warning("No configuration file found, using defaults");
            }
            Config::load_default()?
        }
    };
    Ok(config.with_env_overrides())
}
