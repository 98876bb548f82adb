//! Configuration loading and validation.
//!
//! Supports JSON5 format so config files can carry comments and trailing
//! commas. Config location: `~/.tollgate/tollgate.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[derive(Default)]
pub struct Config {
    /// Gateway server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Secret store connection configuration.
    #[serde(default)]
    pub secret_store: SecretStoreConfig,

    /// Upstream backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Global settings.
    #[serde(default)]
    pub settings: GlobalSettings,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = json5::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or file write fails.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default config file path.
    ///
    /// Uses `TOLLGATE_CONFIG` env var if set, otherwise
    /// `<state dir>/tollgate.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("TOLLGATE_CONFIG") {
            PathBuf::from(path)
        } else {
            Self::state_dir().join("tollgate.json")
        }
    }

    /// Get the Tollgate state directory.
    ///
    /// Uses `TOLLGATE_STATE_DIR` env var if set, otherwise `~/.tollgate`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("TOLLGATE_STATE_DIR") {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".tollgate")
        } else {
            PathBuf::from(".tollgate")
        }
    }

    /// Apply `TOLLGATE_*` environment overrides on top of the file values.
    ///
    /// Callers should re-validate after applying overrides; the environment
    /// can introduce values the file never carried.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(prefix) = std::env::var("TOLLGATE_KEY_PREFIX") {
            self.secret_store.key_prefix = prefix;
        }
        if let Ok(url) = std::env::var("TOLLGATE_STORE_URL") {
            self.secret_store.base_url = Some(url);
        }
        if let Ok(token) = std::env::var("TOLLGATE_STORE_TOKEN") {
            self.secret_store.auth_token = Some(token);
        }
        if let Ok(url) = std::env::var("TOLLGATE_BACKEND_URL") {
            self.backend.base_url = url;
        }
        if let Ok(key) = std::env::var("TOLLGATE_BACKEND_API_KEY") {
            self.backend.api_key = Some(key);
        }
        if let Ok(value) = std::env::var("TOLLGATE_DEBUG") {
            self.settings.debug = value == "1" || value.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.secret_store.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "Secret store key prefix cannot be empty".to_string(),
            ));
        }

        if let Some(url) = &self.secret_store.base_url {
            validate_url("secretStore.baseUrl", url)?;
        }
        validate_url("backend.baseUrl", &self.backend.base_url)?;

        Ok(())
    }

    /// The secret store base URL, required to run the gateway.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when no store URL is configured.
    pub fn store_url(&self) -> Result<&str, ConfigError> {
        self.secret_store
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("secretStore.baseUrl".to_string()))
    }
}

fn validate_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must start with http:// or https://, got '{url}'"
        )))
    }
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address mode.
    #[serde(default)]
    pub mode: BindMode,

    /// Enable CORS.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl ServerConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            mode: BindMode::default(),
            cors: true,
            timeout_secs: default_request_timeout(),
        }
    }
}

const fn default_port() -> u16 {
    8000
}

const fn default_request_timeout() -> u64 {
    300
}

const fn default_true() -> bool {
    true
}

/// Gateway bind mode.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    /// Bind to localhost only.
    Local,
    /// Bind to all interfaces.
    #[default]
    Public,
    /// Custom bind address.
    Custom(String),
}

impl BindMode {
    /// The address to bind.
    #[must_use]
    pub fn address(&self) -> &str {
        match self {
            Self::Local => "127.0.0.1",
            Self::Public => "0.0.0.0",
            Self::Custom(addr) => addr.as_str(),
        }
    }
}

/// Secret store connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretStoreConfig {
    /// Base URL of the store API.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Name prefix under which gateway credentials live.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Bearer token for the store itself.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,

    /// Ask the store to decrypt values server-side.
    #[serde(default = "default_true")]
    pub decrypt: bool,
}

impl SecretStoreConfig {
    /// Store call timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SecretStoreConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            key_prefix: default_key_prefix(),
            auth_token: None,
            timeout_secs: default_store_timeout(),
            decrypt: true,
        }
    }
}

fn default_key_prefix() -> String {
    "TollgateApiKey".to_string()
}

const fn default_store_timeout() -> u64 {
    5
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// API key for the backend (prefer env override in production).
    #[serde(default)]
    pub api_key: Option<String>,

    /// Organization ID header value.
    #[serde(default)]
    pub org_id: Option<String>,

    /// Per-call timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl BackendConfig {
    /// Backend call timeout as a [`Duration`].
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            api_key: None,
            org_id: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_backend_url() -> String {
    "https://api.openai.com".to_string()
}

/// Global settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[derive(Default)]
pub struct GlobalSettings {
    /// Enable debug logging.
    #[serde(default)]
    pub debug: bool,

    /// Log format.
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Log format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// JSON format.
    Json,
}
