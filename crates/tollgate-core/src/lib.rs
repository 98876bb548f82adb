//! # Tollgate Core
//!
//! Core types, configuration, and secret-store access for Tollgate.
//!
//! This crate provides:
//! - Configuration loading and validation (JSON5 format)
//! - Sealed credential values that cannot leak through logs
//! - The secret store interface, its HTTP client, and an in-memory store
//! - The authentication gate that checks presented bearer tokens

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod config;
pub mod secrets;

pub use auth::{AuthError, AuthGate};
pub use config::{Config, ConfigError};
pub use secrets::http::HttpSecretStore;
pub use secrets::{Credential, MemorySecretStore, SecretStore, SecretStoreError};
