//! In-process key-wrapping authority for tests and local development.
//!
//! Each KEK is a random AES-256 key; wrapping is AES-GCM with the KEK's key
//! name as associated data, so a DEK wrapped for one tenant cannot be
//! unwrapped under another tenant's KEK.

use crate::error::{KeyWrapError, KeyWrapResult};
use crate::key::DataKey;
use crate::models::{KekId, KekProperties, kek_key_name};
use crate::provider::KeyWrapper;
use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use async_trait::async_trait;
use rand::RngCore;
use rand::rngs::OsRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

struct KekEntry {
    key: DataKey,
    tenant: String,
    retired: bool,
}

/// Key-wrapping authority held in memory, with call counters and failure
/// injection.
#[derive(Default)]
pub struct InMemoryKeyWrapper {
    keks: RwLock<HashMap<String, KekEntry>>,
    wraps: AtomicU64,
    unwraps: AtomicU64,
    creates: AtomicU64,
    retires: AtomicU64,
    failures_remaining: AtomicU32,
}

impl InMemoryKeyWrapper {
    /// Create an authority with no KEKs.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` calls fail with a transient error.
    pub fn fail_next(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of `wrap` calls so far.
    #[must_use]
    pub fn wrap_count(&self) -> u64 {
        self.wraps.load(Ordering::SeqCst)
    }

    /// Number of `unwrap` calls so far.
    #[must_use]
    pub fn unwrap_count(&self) -> u64 {
        self.unwraps.load(Ordering::SeqCst)
    }

    /// Number of KEKs provisioned so far, including rotations.
    #[must_use]
    pub fn create_count(&self) -> u64 {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of KEKs soft-deleted so far.
    #[must_use]
    pub fn retire_count(&self) -> u64 {
        self.retires.load(Ordering::SeqCst)
    }

    /// Whether `kek_id` exists for `tenant` and has been soft-deleted.
    pub async fn is_retired(&self, kek_id: &KekId, tenant: &str) -> bool {
        self.keks
            .read()
            .await
            .get(&kek_key_name(tenant, kek_id))
            .is_some_and(|entry| entry.retired)
    }

    /// Number of enabled KEKs belonging to `tenant`.
    pub async fn active_kek_count(&self, tenant: &str) -> usize {
        self.keks
            .read()
            .await
            .values()
            .filter(|entry| entry.tenant == tenant && !entry.retired)
            .count()
    }

    fn injected_failure(&self) -> KeyWrapResult<()> {
        let took = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if took {
            Err(KeyWrapError::unavailable("injected failure"))
        } else {
            Ok(())
        }
    }

    async fn cipher_for(&self, name: &str) -> KeyWrapResult<Aes256Gcm> {
        let keks = self.keks.read().await;
        match keks.get(name) {
            Some(entry) if !entry.retired => Aes256Gcm::new_from_slice(entry.key.expose())
                .map_err(|e| KeyWrapError::InvalidKeyMaterial(e.to_string())),
            _ => Err(KeyWrapError::KeyNotFound(name.to_string())),
        }
    }

    async fn provision(&self, tenant: &str) -> KeyWrapResult<KekId> {
        self.injected_failure()?;
        let kek_id = KekId::generate();
        self.keks.write().await.insert(
            kek_key_name(tenant, &kek_id),
            KekEntry {
                key: DataKey::generate(),
                tenant: tenant.to_string(),
                retired: false,
            },
        );
        self.creates.fetch_add(1, Ordering::SeqCst);
        debug!(tenant, kek_id = %kek_id, "Created in-memory KEK");
        Ok(kek_id)
    }

    async fn seal(&self, name: &str, dek: &DataKey) -> KeyWrapResult<Vec<u8>> {
        self.injected_failure()?;
        let cipher = self.cipher_for(name).await?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);
        let sealed = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: dek.expose(),
                    aad: name.as_bytes(),
                },
            )
            .map_err(|e| KeyWrapError::InvalidKeyMaterial(e.to_string()))?;

        let mut wrapped = Vec::with_capacity(NONCE_LEN + sealed.len());
        wrapped.extend_from_slice(&nonce);
        wrapped.extend_from_slice(&sealed);
        Ok(wrapped)
    }

    async fn open(&self, name: &str, wrapped: &[u8]) -> KeyWrapResult<DataKey> {
        self.injected_failure()?;
        let cipher = self.cipher_for(name).await?;

        if wrapped.len() <= NONCE_LEN {
            return Err(KeyWrapError::InvalidKeyMaterial(
                "wrapped key too short".to_string(),
            ));
        }
        let (nonce, sealed) = wrapped.split_at(NONCE_LEN);
        let raw = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(nonce),
                    Payload {
                        msg: sealed,
                        aad: name.as_bytes(),
                    },
                )
                .map_err(|e| KeyWrapError::InvalidKeyMaterial(e.to_string()))?,
        );

        DataKey::from_slice(&raw).ok_or_else(|| {
            KeyWrapError::InvalidKeyMaterial(format!("unwrapped key is {} bytes", raw.len()))
        })
    }
}

#[async_trait]
impl KeyWrapper for InMemoryKeyWrapper {
    async fn wrap(&self, dek: &DataKey, kek_id: &KekId, tenant: &str) -> KeyWrapResult<Vec<u8>> {
        self.wraps.fetch_add(1, Ordering::SeqCst);
        self.seal(&kek_key_name(tenant, kek_id), dek)
            .await
            .map_err(|e| KeyWrapError::wrap_failed(kek_id.as_str(), e))
    }

    async fn unwrap(&self, wrapped: &[u8], kek_id: &KekId, tenant: &str) -> KeyWrapResult<DataKey> {
        self.unwraps.fetch_add(1, Ordering::SeqCst);
        self.open(&kek_key_name(tenant, kek_id), wrapped)
            .await
            .map_err(|e| KeyWrapError::unwrap_failed(kek_id.as_str(), e))
    }

    async fn create_kek(&self, tenant: &str, _properties: &KekProperties) -> KeyWrapResult<KekId> {
        self.provision(tenant)
            .await
            .map_err(|e| KeyWrapError::provisioning_failed(tenant, e))
    }

    async fn rotate_kek(&self, old_kek_id: &KekId, tenant: &str) -> KeyWrapResult<KekId> {
        let new_kek_id = self
            .provision(tenant)
            .await
            .map_err(|e| KeyWrapError::provisioning_failed(tenant, e))?;
        self.retire_kek(old_kek_id, tenant).await?;
        Ok(new_kek_id)
    }

    async fn retire_kek(&self, kek_id: &KekId, tenant: &str) -> KeyWrapResult<()> {
        self.injected_failure()?;
        if let Some(entry) = self
            .keks
            .write()
            .await
            .get_mut(&kek_key_name(tenant, kek_id))
        {
            entry.retired = true;
            self.retires.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn props() -> KekProperties {
        KekProperties::new(4096, Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_wrap_unwrap_round_trip() {
        let authority = InMemoryKeyWrapper::new();
        let kek = authority.create_kek("t1", &props()).await.unwrap();
        let dek = DataKey::generate();

        let wrapped = authority.wrap(&dek, &kek, "t1").await.unwrap();
        assert_ne!(&wrapped[..], &dek.expose()[..]);

        let unwrapped = authority.unwrap(&wrapped, &kek, "t1").await.unwrap();
        assert_eq!(unwrapped, dek);
    }

    #[tokio::test]
    async fn test_unwrap_under_other_tenant_fails() {
        let authority = InMemoryKeyWrapper::new();
        let kek = authority.create_kek("t1", &props()).await.unwrap();
        let wrapped = authority.wrap(&DataKey::generate(), &kek, "t1").await.unwrap();

        let err = authority.unwrap(&wrapped, &kek, "t2").await.unwrap_err();
        assert!(matches!(err, KeyWrapError::UnwrapFailed { .. }));
    }

    #[tokio::test]
    async fn test_rotate_retires_old_kek() {
        let authority = InMemoryKeyWrapper::new();
        let old = authority.create_kek("t1", &props()).await.unwrap();
        let wrapped = authority.wrap(&DataKey::generate(), &old, "t1").await.unwrap();

        let new = authority.rotate_kek(&old, "t1").await.unwrap();

        assert_ne!(old, new);
        assert!(authority.is_retired(&old, "t1").await);
        assert!(!authority.is_retired(&new, "t1").await);
        assert_eq!(authority.active_kek_count("t1").await, 1);
        assert!(authority.unwrap(&wrapped, &old, "t1").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failure_is_transient() {
        use envelope_common::Retryable;

        let authority = InMemoryKeyWrapper::new();
        authority.fail_next(1);

        let err = authority.create_kek("t1", &props()).await.unwrap_err();
        assert!(matches!(err, KeyWrapError::KeyProvisioningFailed { .. }));
        assert!(err.is_retryable());
        assert!(authority.create_kek("t1", &props()).await.is_ok());
    }
}
