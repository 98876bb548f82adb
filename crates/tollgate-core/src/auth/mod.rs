//! The authentication gate.
//!
//! Checks presented bearer tokens against the secret store on every request.
//! Nothing is cached between checks, so rotating a credential in the store
//! takes effect on the next request without a restart.

use std::sync::Arc;

use thiserror::Error;

use crate::secrets::{SecretStore, SecretStoreError};

/// Authentication failures.
///
/// Both variants surface as the same generic denial at the HTTP boundary;
/// the split exists so operators can tell a bad token from a broken store.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The presented token matched none of the registered credentials.
    #[error("invalid credential")]
    InvalidCredential,

    /// The secret store failed mid-check, so no verdict was possible.
    #[error("secret store unavailable: {0}")]
    StoreUnavailable(#[from] SecretStoreError),
}

/// Validates presented tokens against every credential under a name prefix.
///
/// Cost is one enumeration plus up to N fetches per check, linear in the
/// number of registered credentials. A caching [`SecretStore`] can be layered
/// underneath if that ever matters; the gate's logic must not depend on it.
pub struct AuthGate {
    store: Arc<dyn SecretStore>,
    prefix: String,
}

impl AuthGate {
    /// Create a gate checking secrets named under `prefix` in `store`.
    #[must_use]
    pub fn new(store: Arc<dyn SecretStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    /// The name prefix this gate enumerates.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Check a presented token against the registered credentials.
    ///
    /// Enumerates names under the configured prefix and fetches values one at
    /// a time, in enumeration order, stopping at the first match. A store
    /// fault aborts the whole check immediately (fail closed) rather than
    /// falling through to a spurious deny. A name deleted between enumeration
    /// and fetch is skipped; the remaining names still get checked.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredential`] when no registered value
    /// matches, [`AuthError::StoreUnavailable`] when the store failed before
    /// a match was found.
    pub async fn authenticate(&self, presented: &str) -> Result<(), AuthError> {
        let names = self.store.list_names(&self.prefix).await?;

        if names.is_empty() {
            tracing::warn!(
                prefix = %self.prefix,
                "no credentials registered under prefix; denying all requests"
            );
            return Err(AuthError::InvalidCredential);
        }

        for name in &names {
            match self.store.fetch(name).await {
                Ok(credential) => {
                    if credential.matches(presented) {
                        tracing::debug!(name = %name, "credential accepted");
                        return Ok(());
                    }
                }
                Err(SecretStoreError::NotFound(_)) => {
                    tracing::debug!(name = %name, "secret vanished between list and fetch; skipping");
                }
                Err(err) => return Err(AuthError::StoreUnavailable(err)),
            }
        }

        Err(AuthError::InvalidCredential)
    }
}
