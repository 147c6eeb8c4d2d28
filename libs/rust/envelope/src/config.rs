//! Envelope service configuration.

use crate::cache::MAX_DEK_CACHE_TTL;
use crate::classification::DataClassification;
use crate::error::{EnvelopeError, EnvelopeResult};
use envelope_kms_client::KekProperties;
use std::env;
use std::time::Duration;

/// Envelope service configuration.
#[derive(Debug, Clone)]
pub struct EnvelopeConfig {
    /// Sliding expiration of cached DEKs
    pub dek_cache_ttl: Duration,
    /// Maximum number of cached tenant DEKs
    pub dek_cache_capacity: usize,
    /// Upper bound on every secret store and key-management call
    pub remote_timeout: Duration,
    /// RSA modulus size for KEKs provisioned by the service
    pub kek_size: u32,
    /// Lifetime of KEKs provisioned by the service
    pub kek_lifetime: Duration,
    /// Classification applied to fields missing from the classification map
    pub default_classification: DataClassification,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            dek_cache_ttl: Duration::from_secs(300),
            dek_cache_capacity: 10_000,
            remote_timeout: Duration::from_secs(10),
            kek_size: 4096,
            kek_lifetime: Duration::from_secs(365 * 24 * 60 * 60),
            default_classification: DataClassification::Protected,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl EnvelopeConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Some(secs) = env_parse("ENVELOPE_DEK_CACHE_TTL_SECS") {
            config.dek_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(capacity) = env_parse("ENVELOPE_DEK_CACHE_CAPACITY") {
            config.dek_cache_capacity = capacity;
        }
        if let Some(secs) = env_parse("ENVELOPE_REMOTE_TIMEOUT_SECS") {
            config.remote_timeout = Duration::from_secs(secs);
        }
        if let Some(size) = env_parse("ENVELOPE_KEK_SIZE") {
            config.kek_size = size;
        }
        if let Some(days) = env_parse::<u64>("ENVELOPE_KEK_LIFETIME_DAYS") {
            config.kek_lifetime = Duration::from_secs(days.saturating_mul(24 * 60 * 60));
        }
        if let Some(level) = env_parse("ENVELOPE_DEFAULT_CLASSIFICATION") {
            config.default_classification = level;
        }

        config
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any duration or the cache capacity is zero, or
    /// the DEK cache TTL exceeds [`MAX_DEK_CACHE_TTL`].
    pub fn validate(&self) -> EnvelopeResult<()> {
        if self.dek_cache_ttl.is_zero() {
            return Err(EnvelopeError::invalid_config("DEK cache TTL must be positive"));
        }
        if self.dek_cache_ttl > MAX_DEK_CACHE_TTL {
            return Err(EnvelopeError::invalid_config(format!(
                "DEK cache TTL must not exceed {}s",
                MAX_DEK_CACHE_TTL.as_secs()
            )));
        }
        if self.dek_cache_capacity == 0 {
            return Err(EnvelopeError::invalid_config("DEK cache capacity must be positive"));
        }
        if self.remote_timeout.is_zero() {
            return Err(EnvelopeError::invalid_config("remote timeout must be positive"));
        }
        if self.kek_lifetime.is_zero() {
            return Err(EnvelopeError::invalid_config("KEK lifetime must be positive"));
        }
        Ok(())
    }

    /// Properties for a KEK provisioned now.
    #[must_use]
    pub fn kek_properties(&self) -> KekProperties {
        KekProperties::new(self.kek_size, self.kek_lifetime)
    }

    /// Set DEK cache TTL.
    #[must_use]
    pub const fn with_dek_cache_ttl(mut self, ttl: Duration) -> Self {
        self.dek_cache_ttl = ttl;
        self
    }

    /// Set DEK cache capacity.
    #[must_use]
    pub const fn with_dek_cache_capacity(mut self, capacity: usize) -> Self {
        self.dek_cache_capacity = capacity;
        self
    }

    /// Set remote call timeout.
    #[must_use]
    pub const fn with_remote_timeout(mut self, timeout: Duration) -> Self {
        self.remote_timeout = timeout;
        self
    }

    /// Set the classification for unmapped fields.
    #[must_use]
    pub const fn with_default_classification(mut self, level: DataClassification) -> Self {
        self.default_classification = level;
        self
    }
}
