//! Secret storage: credential values and the store interface.
//!
//! - `Credential`: wrapper that prevents accidental logging
//! - `SecretStore`: the two operations the authentication gate depends on
//! - `MemorySecretStore`: deterministic in-memory implementation

pub mod http;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretBox};
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors from secret store operations.
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// The named secret does not exist. Enumeration can race deletion, so a
    /// fetch of a just-listed name may still land here.
    #[error("secret not found: {0}")]
    NotFound(String),

    /// The store could not be reached or gave an unusable answer.
    #[error("secret store unavailable: {0}")]
    Unavailable(String),
}

/// A credential value held by the secret store.
///
/// The inner value is wrapped with `secrecy::SecretBox` to ensure it's not
/// accidentally printed in logs or debug output, and is zeroized on drop.
/// Comparison goes through [`Credential::matches`].
#[derive(Clone)]
pub struct Credential(SecretBox<str>);

impl Credential {
    /// Wrap a raw secret value.
    #[must_use]
    pub fn new(value: String) -> Self {
        Self(SecretBox::new(value.into_boxed_str()))
    }

    /// Compare against a presented token in constant time.
    ///
    /// Length is checked first; equal-length values compare without
    /// data-dependent branching.
    #[must_use]
    pub fn matches(&self, presented: &str) -> bool {
        let value = self.0.expose_secret().as_bytes();
        let presented = presented.as_bytes();
        if value.len() != presented.len() {
            return false;
        }
        value.ct_eq(presented).into()
    }

    /// Expose the secret for actual API calls.
    ///
    /// Use sparingly - only when actually sending to an API.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential([REDACTED])")
    }
}

impl std::fmt::Display for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// The two-operation interface the authentication gate depends on.
///
/// Implementations make no caching promises: the gate calls both operations
/// on every check, so a rotation in the backing store takes effect on the
/// next request.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// List the names of all secrets starting with `prefix`.
    ///
    /// An empty list is a valid answer, not an error. Order must be stable
    /// for an unchanged backing set.
    ///
    /// # Errors
    ///
    /// Returns [`SecretStoreError::Unavailable`] if the store cannot answer.
    async fn list_names(&self, prefix: &str) -> Result<Vec<String>, SecretStoreError>;

    /// Fetch the decrypted value of one named secret.
    ///
    /// # Errors
    ///
    /// Returns [`SecretStoreError::NotFound`] if the name does not exist,
    /// [`SecretStoreError::Unavailable`] if the store cannot answer.
    async fn fetch(&self, name: &str) -> Result<Credential, SecretStoreError>;
}

/// In-memory secret store backed by a `BTreeMap`.
///
/// Names enumerate in lexicographic order, which keeps checks deterministic.
/// Entries can be inserted and removed behind a shared reference, so a store
/// held by a running gate can be rotated in place. Fetches are counted so
/// tests can assert how many lookups a check performed.
#[derive(Default)]
pub struct MemorySecretStore {
    entries: RwLock<BTreeMap<String, Credential>>,
    fetches: AtomicUsize,
}

impl MemorySecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a secret.
    pub async fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        let mut entries = self.entries.write().await;
        entries.insert(name.into(), Credential::new(value.into()));
    }

    /// Remove a secret. Removing an absent name is a no-op.
    pub async fn remove(&self, name: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(name);
    }

    /// Number of fetches served since construction.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn list_names(&self, prefix: &str) -> Result<Vec<String>, SecretStoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn fetch(&self, name: &str) -> Result<Credential, SecretStoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.read().await;
        entries
            .get(name)
            .cloned()
            .ok_or_else(|| SecretStoreError::NotFound(name.to_string()))
    }
}
