//! Secret store abstraction.

use crate::error::SecretStoreResult;
use async_trait::async_trait;

/// Outcome of a secret lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLookup {
    /// The secret exists
    Found(String),
    /// No secret is stored under the name
    NotFound,
}

impl SecretLookup {
    /// Convert into an `Option`.
    #[must_use]
    pub fn into_option(self) -> Option<String> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

/// Outcome of a conditional create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// This call wrote the secret
    Created,
    /// Another writer got there first; nothing was written
    AlreadyExists,
}

/// Durable storage for opaque string secrets addressed by name.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret.
    async fn get_secret(&self, name: &str) -> SecretStoreResult<SecretLookup>;

    /// Write a secret, replacing any existing value.
    async fn set_secret(&self, name: &str, value: &str) -> SecretStoreResult<()>;

    /// Write a secret only if nothing is stored under `name` yet.
    ///
    /// A secret that [`get_secret`](Self::get_secret) reports as
    /// `NotFound`, including a deleted one, counts as absent.
    async fn create_secret(&self, name: &str, value: &str) -> SecretStoreResult<CreateOutcome>;
}
