//! Test fixtures with sample data.
//!
//! [`EnvelopeFixture`] wires an [`EnvelopeCryptoService`] to in-memory
//! collaborators and keeps handles to them for call-count assertions.

use envelope_crypto::{
    ClassificationMap, DataClassification, EnvelopeConfig, EnvelopeCryptoService,
    InMemoryDekCache, StaticTenantResolver, TenantId, TenantResolver,
};
use envelope_kms_client::{InMemoryKeyWrapper, KeyWrapper};
use envelope_vault_client::{InMemorySecretStore, SecretStore};
use std::sync::Arc;

/// Sample protected identity attribute.
pub const SAMPLE_LICENCE_NUMBER: &str = "12345678-9012";

/// Sample field table for a credential record.
#[must_use]
pub fn sample_classification_map() -> ClassificationMap {
    ClassificationMap::new(DataClassification::Protected)
        .with_field("credential.type", DataClassification::Unofficial)
        .with_field("credential.issuer", DataClassification::Official)
        .with_field("credential.holder_name", DataClassification::OfficialSensitive)
        .with_field("credential.licence_number", DataClassification::Protected)
}

/// Envelope service over in-memory collaborators for one tenant.
pub struct EnvelopeFixture {
    /// Service under test
    pub service: EnvelopeCryptoService,
    /// Backing secret store
    pub secrets: Arc<InMemorySecretStore>,
    /// Backing key-wrapping authority
    pub wrapper: Arc<InMemoryKeyWrapper>,
    /// DEK cache used by `service`
    pub cache: Arc<InMemoryDekCache>,
    /// Tenant every call resolves to
    pub tenant: TenantId,
}

impl EnvelopeFixture {
    /// Fixture for `tenant` with default configuration.
    #[must_use]
    pub fn new(tenant: &str) -> Self {
        Self::with_config(tenant, EnvelopeConfig::default())
    }

    /// Fixture for `tenant` with `config`.
    #[must_use]
    pub fn with_config(tenant: &str, config: EnvelopeConfig) -> Self {
        let tenant = TenantId::new(tenant).expect("fixture tenant id");
        let secrets = Arc::new(InMemorySecretStore::new());
        let wrapper = Arc::new(InMemoryKeyWrapper::new());
        let cache = Arc::new(InMemoryDekCache::from_config(&config));
        let service = build_service(
            secrets.clone(),
            wrapper.clone(),
            cache.clone(),
            Arc::new(StaticTenantResolver::new(tenant.clone())),
            config,
        )
        .with_classification_map(sample_classification_map());

        Self {
            service,
            secrets,
            wrapper,
            cache,
            tenant,
        }
    }

    /// Another service instance sharing this fixture's store and authority
    /// but with its own cache, like a second replica.
    #[must_use]
    pub fn replica(&self) -> EnvelopeCryptoService {
        self.replica_with(self.secrets.clone(), self.wrapper.clone())
    }

    /// A replica for this fixture's tenant over the given collaborators.
    #[must_use]
    pub fn replica_with(
        &self,
        secrets: Arc<dyn SecretStore>,
        wrapper: Arc<dyn KeyWrapper>,
    ) -> EnvelopeCryptoService {
        let config = self.service.config().clone();
        build_service(
            secrets,
            wrapper,
            Arc::new(InMemoryDekCache::from_config(&config)),
            Arc::new(StaticTenantResolver::new(self.tenant.clone())),
            config,
        )
    }
}

/// Build a service, panicking on invalid configuration.
#[must_use]
pub fn build_service(
    secrets: Arc<dyn SecretStore>,
    wrapper: Arc<dyn KeyWrapper>,
    cache: Arc<InMemoryDekCache>,
    tenants: Arc<dyn TenantResolver>,
    config: EnvelopeConfig,
) -> EnvelopeCryptoService {
    EnvelopeCryptoService::new(secrets, wrapper, cache, tenants, config)
        .expect("valid envelope configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_map() {
        let map = sample_classification_map();
        assert_eq!(map.classify("credential.type"), DataClassification::Unofficial);
        assert_eq!(map.classify("credential.unknown"), DataClassification::Protected);
    }

    #[test]
    fn test_fixture_starts_empty() {
        let fixture = EnvelopeFixture::new("T1");
        assert_eq!(fixture.tenant.dek_secret_name(), "dek-t1");
        assert_eq!(fixture.secrets.get_count(), 0);
        assert_eq!(fixture.wrapper.create_count(), 0);
    }
}
