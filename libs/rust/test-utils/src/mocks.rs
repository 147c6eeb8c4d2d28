//! Test doubles for the secret store and key-wrapping authority.

use async_trait::async_trait;
use envelope_kms_client::{
    DataKey, InMemoryKeyWrapper, KekId, KekProperties, KeyWrapResult, KeyWrapper,
};
use envelope_vault_client::{
    CreateOutcome, InMemorySecretStore, SecretLookup, SecretStore, SecretStoreError,
    SecretStoreResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Secret store whose first reads miss, as if another replica were
/// creating the same tenant's keys concurrently.
///
/// The first `stale_reads` lookups answer `NotFound` without consulting the
/// backing store; every later call is delegated.
#[derive(Debug)]
pub struct StaleReadSecretStore {
    inner: Arc<InMemorySecretStore>,
    stale_reads: AtomicU32,
}

impl StaleReadSecretStore {
    /// Wrap `inner`, missing the next `stale_reads` lookups.
    #[must_use]
    pub fn new(inner: Arc<InMemorySecretStore>, stale_reads: u32) -> Self {
        Self {
            inner,
            stale_reads: AtomicU32::new(stale_reads),
        }
    }

    /// Stale lookups still to be served.
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.stale_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecretStore for StaleReadSecretStore {
    async fn get_secret(&self, name: &str) -> SecretStoreResult<SecretLookup> {
        let stale = self
            .stale_reads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if stale {
            return Ok(SecretLookup::NotFound);
        }
        self.inner.get_secret(name).await
    }

    async fn set_secret(&self, name: &str, value: &str) -> SecretStoreResult<()> {
        self.inner.set_secret(name, value).await
    }

    async fn create_secret(&self, name: &str, value: &str) -> SecretStoreResult<CreateOutcome> {
        self.inner.create_secret(name, value).await
    }
}

/// Secret store that rejects the next `failures` overwrites of secrets whose
/// name starts with `prefix`, as if the store dropped out mid-operation.
#[derive(Debug)]
pub struct FailingWriteSecretStore {
    inner: Arc<InMemorySecretStore>,
    prefix: String,
    failures: AtomicU32,
}

impl FailingWriteSecretStore {
    /// Wrap `inner`, failing the next `failures` writes under `prefix`.
    #[must_use]
    pub fn new(inner: Arc<InMemorySecretStore>, prefix: impl Into<String>, failures: u32) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
            failures: AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl SecretStore for FailingWriteSecretStore {
    async fn get_secret(&self, name: &str) -> SecretStoreResult<SecretLookup> {
        self.inner.get_secret(name).await
    }

    async fn set_secret(&self, name: &str, value: &str) -> SecretStoreResult<()> {
        let fail = name.starts_with(&self.prefix)
            && self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if fail {
            return Err(SecretStoreError::unavailable("write dropped"));
        }
        self.inner.set_secret(name, value).await
    }

    async fn create_secret(&self, name: &str, value: &str) -> SecretStoreResult<CreateOutcome> {
        self.inner.create_secret(name, value).await
    }
}

/// Key-wrapping authority that answers only after `delay`.
pub struct SlowKeyWrapper {
    inner: Arc<InMemoryKeyWrapper>,
    delay: Duration,
}

impl SlowKeyWrapper {
    /// Delay every call to `inner` by `delay`.
    #[must_use]
    pub const fn new(inner: Arc<InMemoryKeyWrapper>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl KeyWrapper for SlowKeyWrapper {
    async fn wrap(&self, dek: &DataKey, kek_id: &KekId, tenant: &str) -> KeyWrapResult<Vec<u8>> {
        tokio::time::sleep(self.delay).await;
        self.inner.wrap(dek, kek_id, tenant).await
    }

    async fn unwrap(&self, wrapped: &[u8], kek_id: &KekId, tenant: &str) -> KeyWrapResult<DataKey> {
        tokio::time::sleep(self.delay).await;
        self.inner.unwrap(wrapped, kek_id, tenant).await
    }

    async fn create_kek(&self, tenant: &str, properties: &KekProperties) -> KeyWrapResult<KekId> {
        tokio::time::sleep(self.delay).await;
        self.inner.create_kek(tenant, properties).await
    }

    async fn rotate_kek(&self, old_kek_id: &KekId, tenant: &str) -> KeyWrapResult<KekId> {
        tokio::time::sleep(self.delay).await;
        self.inner.rotate_kek(old_kek_id, tenant).await
    }

    async fn retire_kek(&self, kek_id: &KekId, tenant: &str) -> KeyWrapResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.retire_kek(kek_id, tenant).await
    }
}
