//! Envelope crypto service.
//!
//! Payloads are sealed with a per-tenant AES-256 DEK. The DEK is stored only
//! wrapped under the tenant's KEK, which never leaves the key-management
//! service. First use of a tenant provisions both keys; creation is
//! conditional in the secret store, so a concurrent creator that loses
//! adopts the winner's keys instead of overwriting them.

use crate::cache::DekCache;
use crate::classification::{ClassificationMap, DataClassification};
use crate::config::EnvelopeConfig;
use crate::envelope::{self, Envelope};
use crate::error::{EnvelopeError, EnvelopeResult};
use crate::metrics::{EnvelopeMetrics, LifecycleEvent};
use crate::stored_dek::StoredDek;
use crate::tenant::{TenantId, TenantResolver};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use envelope_kms_client::{DataKey, KekId, KeyWrapper};
use envelope_vault_client::{CreateOutcome, SecretLookup, SecretStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Envelope encryption over strings and byte buffers, scoped to the tenant
/// supplied by the [`TenantResolver`].
pub struct EnvelopeCryptoService {
    secrets: Arc<dyn SecretStore>,
    wrapper: Arc<dyn KeyWrapper>,
    cache: Arc<dyn DekCache>,
    tenants: Arc<dyn TenantResolver>,
    fields: ClassificationMap,
    config: EnvelopeConfig,
    metrics: EnvelopeMetrics,
}

impl EnvelopeCryptoService {
    /// Create a service over the given collaborators.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn new(
        secrets: Arc<dyn SecretStore>,
        wrapper: Arc<dyn KeyWrapper>,
        cache: Arc<dyn DekCache>,
        tenants: Arc<dyn TenantResolver>,
        config: EnvelopeConfig,
    ) -> EnvelopeResult<Self> {
        config.validate()?;
        Ok(Self {
            secrets,
            wrapper,
            cache,
            tenants,
            fields: ClassificationMap::new(config.default_classification),
            config,
            metrics: EnvelopeMetrics::new(),
        })
    }

    /// Use `fields` to classify [`encrypt_field`](Self::encrypt_field) input.
    #[must_use]
    pub fn with_classification_map(mut self, fields: ClassificationMap) -> Self {
        self.fields = fields;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EnvelopeConfig {
        &self.config
    }

    /// Field classification table.
    #[must_use]
    pub const fn classification_map(&self) -> &ClassificationMap {
        &self.fields
    }

    /// Encrypt `plaintext` and return the envelope base64-encoded.
    ///
    /// Unprotected classifications and the empty string are returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// See [`encrypt_bytes`](Self::encrypt_bytes).
    #[instrument(skip(self, plaintext), fields(classification = %classification))]
    pub async fn encrypt_text(
        &self,
        plaintext: &str,
        classification: DataClassification,
    ) -> EnvelopeResult<String> {
        if !classification.requires_protection() || plaintext.is_empty() {
            return Ok(plaintext.to_string());
        }
        let framed = self
            .encrypt_bytes(plaintext.as_bytes(), classification)
            .await?;
        Ok(STANDARD.encode(framed))
    }

    /// Decrypt a base64-encoded envelope produced by
    /// [`encrypt_text`](Self::encrypt_text).
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidEncoding`] for bad base64 or a
    /// non-UTF-8 plaintext, otherwise see [`decrypt_bytes`](Self::decrypt_bytes).
    #[instrument(skip(self, ciphertext), fields(classification = %classification))]
    pub async fn decrypt_text(
        &self,
        ciphertext: &str,
        classification: DataClassification,
    ) -> EnvelopeResult<String> {
        if !classification.requires_protection() || ciphertext.is_empty() {
            return Ok(ciphertext.to_string());
        }
        let framed = STANDARD
            .decode(ciphertext)
            .map_err(|e| EnvelopeError::invalid_encoding(format!("ciphertext is not base64: {e}")))?;
        let plain = self.decrypt_bytes(&framed, classification).await?;
        String::from_utf8(plain).map_err(|e| {
            EnvelopeError::invalid_encoding(format!("plaintext is not UTF-8: {}", e.utf8_error()))
        })
    }

    /// Seal `plain` under the current tenant's DEK.
    ///
    /// The result is `version || nonce || tag || ciphertext`, 29 bytes longer
    /// than the input. Unprotected classifications are returned unchanged.
    ///
    /// # Errors
    ///
    /// Fails if no tenant is resolved or the DEK cannot be obtained. Nothing
    /// is returned unless the payload was sealed.
    #[instrument(skip(self, plain), fields(len = plain.len(), classification = %classification))]
    pub async fn encrypt_bytes(
        &self,
        plain: &[u8],
        classification: DataClassification,
    ) -> EnvelopeResult<Vec<u8>> {
        if !classification.requires_protection() {
            return Ok(plain.to_vec());
        }
        let start = Instant::now();
        let result = self.seal_for_current_tenant(plain).await;
        self.metrics
            .record_operation("encrypt", result.is_ok(), start.elapsed());
        result
    }

    /// Verify and open an envelope produced by
    /// [`encrypt_bytes`](Self::encrypt_bytes). Unprotected classifications
    /// are returned unchanged.
    ///
    /// # Errors
    ///
    /// [`EnvelopeError::InvalidFormat`] below 29 bytes,
    /// [`EnvelopeError::UnsupportedVersion`] for a version other than 1, and
    /// [`EnvelopeError::AuthenticationFailed`] when the tag does not verify.
    #[instrument(skip(self, framed), fields(len = framed.len(), classification = %classification))]
    pub async fn decrypt_bytes(
        &self,
        framed: &[u8],
        classification: DataClassification,
    ) -> EnvelopeResult<Vec<u8>> {
        if !classification.requires_protection() {
            return Ok(framed.to_vec());
        }
        let start = Instant::now();
        let result = self.open_for_current_tenant(framed).await;
        self.metrics
            .record_operation("decrypt", result.is_ok(), start.elapsed());
        result
    }

    /// Encrypt `value` at the classification mapped to `field`.
    ///
    /// # Errors
    ///
    /// See [`encrypt_text`](Self::encrypt_text).
    pub async fn encrypt_field(&self, field: &str, value: &str) -> EnvelopeResult<String> {
        self.encrypt_text(value, self.fields.classify(field)).await
    }

    /// Decrypt `value` at the classification mapped to `field`.
    ///
    /// # Errors
    ///
    /// See [`decrypt_text`](Self::decrypt_text).
    pub async fn decrypt_field(&self, field: &str, value: &str) -> EnvelopeResult<String> {
        self.decrypt_text(value, self.fields.classify(field)).await
    }

    /// Replace the tenant's DEK with a fresh one wrapped under the current KEK.
    ///
    /// Envelopes sealed under the previous DEK can no longer be opened. Only
    /// call this after every protected value of the tenant has been
    /// re-encrypted, or as part of such a pass.
    ///
    /// # Errors
    ///
    /// Fails if wrapping or persisting the new DEK fails; the stored DEK is
    /// then unchanged.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn rotate_dek(&self, tenant: &TenantId) -> EnvelopeResult<()> {
        let start = Instant::now();
        let result = self.replace_dek(tenant).await;
        self.metrics
            .record_operation("rotate_dek", result.is_ok(), start.elapsed());
        result
    }

    /// Move the tenant onto a new KEK.
    ///
    /// The stored DEK is unwrapped under the KEK recorded with it, re-wrapped
    /// under a newly provisioned one, and written back together with the new
    /// KEK id in a single write. The KEK reference is switched afterwards and
    /// the old KEK soft-deleted. Existing envelopes stay readable, and a
    /// rotation interrupted after the DEK write can simply be retried.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::SecretNotFound`] if the tenant has no KEK,
    /// or the first failing remote call.
    #[instrument(skip(self), fields(tenant = %tenant))]
    pub async fn rotate_kek(&self, tenant: &TenantId) -> EnvelopeResult<KekId> {
        let start = Instant::now();
        let result = self.replace_kek(tenant).await;
        self.metrics
            .record_operation("rotate_kek", result.is_ok(), start.elapsed());
        result
    }

    /// Version of the tenant's DEK. Wrapped DEKs carry no version metadata,
    /// so this is always 1.
    #[must_use]
    pub const fn current_dek_version(&self, _tenant: &TenantId) -> u32 {
        1
    }

    async fn seal_for_current_tenant(&self, plain: &[u8]) -> EnvelopeResult<Vec<u8>> {
        let tenant = self.tenants.current_tenant()?;
        let dek = self.get_or_create_dek(&tenant).await?;
        envelope::seal(&dek, plain)
    }

    async fn open_for_current_tenant(&self, framed: &[u8]) -> EnvelopeResult<Vec<u8>> {
        let envelope = Envelope::parse(framed)?;
        let tenant = self.tenants.current_tenant()?;
        let dek = self.get_or_create_dek(&tenant).await?;
        envelope.open(&dek).inspect_err(|_| {
            warn!(tenant = %tenant, "Envelope failed authentication");
        })
    }

    /// Cache, then stored DEK, then first-use creation. Transient failures
    /// propagate; only a confirmed absence creates keys.
    async fn get_or_create_dek(&self, tenant: &TenantId) -> EnvelopeResult<DataKey> {
        if let Some(dek) = self.cache.get(tenant) {
            self.metrics.record_cache_hit();
            debug!(tenant = %tenant, "DEK cache hit");
            return Ok(dek);
        }
        self.metrics.record_cache_miss();
        debug!(tenant = %tenant, "DEK cache miss");

        let dek = match self.read_secret(&tenant.dek_secret_name()).await? {
            SecretLookup::Found(blob) => self.unwrap_stored(tenant, &blob).await?,
            SecretLookup::NotFound => self.create_dek(tenant).await?,
        };
        self.cache.put(tenant, dek.clone());
        Ok(dek)
    }

    async fn create_dek(&self, tenant: &TenantId) -> EnvelopeResult<DataKey> {
        let kek_id = self.get_or_create_kek(tenant).await?;
        let dek = DataKey::generate();
        let wrapped = self
            .remote("key wrap", self.wrapper.wrap(&dek, &kek_id, tenant.as_str()))
            .await?;

        let name = tenant.dek_secret_name();
        let stored = StoredDek::new(kek_id.clone(), wrapped).encode();
        let outcome = self
            .remote(
                "secret store write",
                self.secrets.create_secret(&name, &stored),
            )
            .await?;

        match outcome {
            CreateOutcome::Created => {
                self.metrics.record_lifecycle(LifecycleEvent::DekCreated);
                info!(tenant = %tenant, kek_id = %kek_id, "Created DEK");
                Ok(dek)
            }
            CreateOutcome::AlreadyExists => {
                drop(dek);
                self.metrics
                    .record_lifecycle(LifecycleEvent::CreationRaceLost);
                warn!(tenant = %tenant, "DEK created concurrently, adopting stored DEK");
                match self.read_secret(&name).await? {
                    SecretLookup::Found(blob) => self.unwrap_stored(tenant, &blob).await,
                    SecretLookup::NotFound => Err(EnvelopeError::SecretNotFound(name)),
                }
            }
        }
    }

    async fn get_or_create_kek(&self, tenant: &TenantId) -> EnvelopeResult<KekId> {
        if let Some(kek_id) = self.current_kek(tenant).await? {
            return Ok(kek_id);
        }

        let kek_id = self
            .remote(
                "KEK provisioning",
                self.wrapper
                    .create_kek(tenant.as_str(), &self.config.kek_properties()),
            )
            .await?;

        let name = tenant.kek_ref_secret_name();
        let outcome = self
            .remote(
                "secret store write",
                self.secrets.create_secret(&name, kek_id.as_str()),
            )
            .await?;

        match outcome {
            CreateOutcome::Created => {
                self.metrics.record_lifecycle(LifecycleEvent::KekCreated);
                info!(tenant = %tenant, kek_id = %kek_id, "Created KEK");
                Ok(kek_id)
            }
            CreateOutcome::AlreadyExists => {
                self.metrics
                    .record_lifecycle(LifecycleEvent::CreationRaceLost);
                warn!(tenant = %tenant, orphan_kek_id = %kek_id, "KEK created concurrently, retiring ours");
                self.retire_quietly(tenant, &kek_id).await;
                self.current_kek(tenant)
                    .await?
                    .ok_or(EnvelopeError::SecretNotFound(name))
            }
        }
    }

    async fn replace_dek(&self, tenant: &TenantId) -> EnvelopeResult<()> {
        self.cache.invalidate(tenant);

        let kek_id = self.get_or_create_kek(tenant).await?;
        let dek = DataKey::generate();
        let wrapped = self
            .remote("key wrap", self.wrapper.wrap(&dek, &kek_id, tenant.as_str()))
            .await?;
        let stored = StoredDek::new(kek_id.clone(), wrapped).encode();
        self.write_secret(&tenant.dek_secret_name(), &stored)
            .await?;

        // A concurrent miss may have cached the old DEK in the meantime.
        self.cache.invalidate(tenant);
        self.metrics.record_lifecycle(LifecycleEvent::DekRotated);
        info!(tenant = %tenant, kek_id = %kek_id, "Rotated DEK");
        Ok(())
    }

    async fn replace_kek(&self, tenant: &TenantId) -> EnvelopeResult<KekId> {
        let kek_ref = tenant.kek_ref_secret_name();
        let referenced = self.current_kek(tenant).await?;

        let dek_name = tenant.dek_secret_name();
        let current = match self.read_secret(&dek_name).await? {
            SecretLookup::Found(blob) => Some(self.load_stored(tenant, &blob).await?),
            SecretLookup::NotFound => None,
        };

        // The KEK recorded with the DEK wins over the reference, which may
        // lag behind after an interrupted rotation.
        let old_kek = current
            .as_ref()
            .map(|(kek_id, _)| kek_id.clone())
            .or_else(|| referenced.clone())
            .ok_or_else(|| EnvelopeError::SecretNotFound(kek_ref.clone()))?;

        let properties = self
            .config
            .kek_properties()
            .with_tag("rotated_from", old_kek.as_str());
        let new_kek = self
            .remote(
                "KEK provisioning",
                self.wrapper.create_kek(tenant.as_str(), &properties),
            )
            .await?;

        if let Some((_, dek)) = &current {
            let wrapped = self
                .remote("key wrap", self.wrapper.wrap(dek, &new_kek, tenant.as_str()))
                .await?;
            let stored = StoredDek::new(new_kek.clone(), wrapped).encode();
            self.write_secret(&dek_name, &stored).await?;
            self.cache.invalidate(tenant);
        }
        self.write_secret(&kek_ref, new_kek.as_str()).await?;
        self.cache.invalidate(tenant);

        self.retire_quietly(tenant, &old_kek).await;
        if let Some(stale) = referenced.filter(|kek_id| *kek_id != old_kek && *kek_id != new_kek) {
            self.retire_quietly(tenant, &stale).await;
        }
        self.metrics.record_lifecycle(LifecycleEvent::KekRotated);
        info!(tenant = %tenant, old_kek_id = %old_kek, new_kek_id = %new_kek, "Rotated KEK");
        Ok(new_kek)
    }

    async fn unwrap_stored(&self, tenant: &TenantId, blob: &str) -> EnvelopeResult<DataKey> {
        self.load_stored(tenant, blob).await.map(|(_, dek)| dek)
    }

    /// Unwrap a stored DEK under the KEK recorded with it, or the tenant's
    /// KEK reference for values that carry none.
    async fn load_stored(
        &self,
        tenant: &TenantId,
        blob: &str,
    ) -> EnvelopeResult<(KekId, DataKey)> {
        let stored = StoredDek::parse(blob).inspect_err(|e| {
            warn!(tenant = %tenant, error = %e, "Stored DEK is malformed");
        })?;
        let kek_id = match stored.kek_id {
            Some(kek_id) => kek_id,
            None => self
                .current_kek(tenant)
                .await?
                .ok_or_else(|| EnvelopeError::SecretNotFound(tenant.kek_ref_secret_name()))?,
        };
        let dek = self
            .remote(
                "key unwrap",
                self.wrapper.unwrap(&stored.wrapped, &kek_id, tenant.as_str()),
            )
            .await?;
        Ok((kek_id, dek))
    }

    async fn current_kek(&self, tenant: &TenantId) -> EnvelopeResult<Option<KekId>> {
        Ok(self
            .read_secret(&tenant.kek_ref_secret_name())
            .await?
            .into_option()
            .map(KekId::new))
    }

    async fn retire_quietly(&self, tenant: &TenantId, kek_id: &KekId) {
        if let Err(e) = self
            .remote(
                "KEK retirement",
                self.wrapper.retire_kek(kek_id, tenant.as_str()),
            )
            .await
        {
            warn!(tenant = %tenant, kek_id = %kek_id, error = %e, "KEK not retired");
        }
    }

    async fn read_secret(&self, name: &str) -> EnvelopeResult<SecretLookup> {
        self.remote("secret store read", self.secrets.get_secret(name))
            .await
    }

    async fn write_secret(&self, name: &str, value: &str) -> EnvelopeResult<()> {
        self.remote("secret store write", self.secrets.set_secret(name, value))
            .await
    }

    /// Bound a collaborator call by `remote_timeout`.
    async fn remote<T, E, F>(&self, call: &'static str, future: F) -> EnvelopeResult<T>
    where
        F: Future<Output = Result<T, E>>,
        EnvelopeError: From<E>,
    {
        match tokio::time::timeout(self.config.remote_timeout, future).await {
            Ok(result) => result.map_err(EnvelopeError::from),
            Err(_) => {
                warn!(call, timeout = ?self.config.remote_timeout, "Remote call timed out");
                Err(EnvelopeError::Timeout(call))
            }
        }
    }
}
