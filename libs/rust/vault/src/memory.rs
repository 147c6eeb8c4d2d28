//! In-process secret store for tests and local development.

use crate::error::{SecretStoreError, SecretStoreResult};
use crate::provider::{CreateOutcome, SecretLookup, SecretStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Secret store held in memory, with call counters and failure injection.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: RwLock<HashMap<String, String>>,
    gets: AtomicU64,
    sets: AtomicU64,
    creates: AtomicU64,
    failures_remaining: AtomicU32,
}

impl InMemorySecretStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of `get_secret` calls so far.
    #[must_use]
    pub fn get_count(&self) -> u64 {
        self.gets.load(Ordering::SeqCst)
    }

    /// Number of `set_secret` calls so far.
    #[must_use]
    pub fn set_count(&self) -> u64 {
        self.sets.load(Ordering::SeqCst)
    }

    /// Number of `create_secret` calls so far.
    #[must_use]
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Current value stored under `name`.
    pub async fn peek(&self, name: &str) -> Option<String> {
        self.secrets.read().await.get(name).cloned()
    }

    /// Remove a secret directly.
    pub async fn remove(&self, name: &str) -> Option<String> {
        self.secrets.write().await.remove(name)
    }

    fn injected_failure(&self) -> SecretStoreResult<()> {
        let took = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(SecretStoreError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret(&self, name: &str) -> SecretStoreResult<SecretLookup> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        Ok(match self.secrets.read().await.get(name) {
            Some(value) => SecretLookup::Found(value.clone()),
            None => SecretLookup::NotFound,
        })
    }

    async fn set_secret(&self, name: &str, value: &str) -> SecretStoreResult<()> {
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        self.secrets
            .write()
            .await
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn create_secret(&self, name: &str, value: &str) -> SecretStoreResult<CreateOutcome> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;
        let mut secrets = self.secrets.write().await;
        if secrets.contains_key(name) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        secrets.insert(name.to_string(), value.to_string());
        Ok(CreateOutcome::Created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_secret_is_not_found() {
        let store = InMemorySecretStore::new();
        assert_eq!(store.get_secret("dek-t1").await.unwrap(), SecretLookup::NotFound);
        assert_eq!(store.get_count(), 1);
    }

    #[tokio::test]
    async fn test_create_is_conditional() {
        let store = InMemorySecretStore::new();

        let first = store.create_secret("kek-ref-t1", "a").await.unwrap();
        let second = store.create_secret("kek-ref-t1", "b").await.unwrap();

        assert_eq!(first, CreateOutcome::Created);
        assert_eq!(second, CreateOutcome::AlreadyExists);
        assert_eq!(store.peek("kek-ref-t1").await.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn test_set_overwrites() {
        let store = InMemorySecretStore::new();
        store.set_secret("dek-t1", "a").await.unwrap();
        store.set_secret("dek-t1", "b").await.unwrap();
        assert_eq!(
            store.get_secret("dek-t1").await.unwrap(),
            SecretLookup::Found("b".to_string())
        );
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let store = InMemorySecretStore::new();
        store.fail_next(1);

        assert!(matches!(
            store.get_secret("dek-t1").await,
            Err(SecretStoreError::Unavailable(_))
        ));
        assert!(store.get_secret("dek-t1").await.is_ok());
    }
}
