//! Key Vault client configuration.

use crate::error::{KeyWrapError, KeyWrapResult};
use envelope_common::CircuitBreakerConfig;
use secrecy::{ExposeSecret, SecretString};
use std::env;
use std::time::Duration;

/// Smallest RSA modulus accepted for a KEK.
pub const MIN_KEK_SIZE: u32 = 2048;

/// Key Vault client configuration.
#[derive(Debug, Clone)]
pub struct KeyVaultConfig {
    /// Vault base URL, e.g. `https://tenant-keys.vault.azure.net`
    pub url: String,
    /// Bearer token for the key-management API
    pub access_token: SecretString,
    /// REST API version
    pub api_version: String,
    /// Request timeout
    pub timeout: Duration,
    /// RSA key size for new KEKs
    pub kek_size: u32,
    /// Lifetime of new KEKs
    pub kek_lifetime: Duration,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout
    pub circuit_breaker_timeout: Duration,
}

impl Default for KeyVaultConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            access_token: SecretString::from(String::new()),
            api_version: "7.4".to_string(),
            timeout: Duration::from_secs(30),
            kek_size: 4096,
            kek_lifetime: Duration::from_secs(365 * 24 * 60 * 60),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(30),
        }
    }
}

impl KeyVaultConfig {
    /// Create a configuration for `url` authenticated with `access_token`.
    #[must_use]
    pub fn new(url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            access_token: SecretString::from(access_token.into()),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(url) = env::var("KEY_VAULT_URL") {
            config.url = url;
        }
        if let Ok(token) = env::var("KEY_VAULT_TOKEN") {
            config.access_token = SecretString::from(token);
        }
        if let Ok(version) = env::var("KEY_VAULT_API_VERSION") {
            config.api_version = version;
        }
        if let Some(size) = env::var("KEY_VAULT_KEK_SIZE").ok().and_then(|v| v.parse().ok()) {
            config.kek_size = size;
        }
        if let Some(days) = env::var("KEY_VAULT_KEK_LIFETIME_DAYS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            config.kek_lifetime = Duration::from_secs(days * 24 * 60 * 60);
        }

        config
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL or token is missing or the key size is too small.
    pub fn validate(&self) -> KeyWrapResult<()> {
        if self.url.is_empty() {
            return Err(KeyWrapError::invalid_config("Key Vault URL is empty"));
        }
        if self.access_token.expose_secret().is_empty() {
            return Err(KeyWrapError::invalid_config("Key Vault access token is empty"));
        }
        if self.kek_size < MIN_KEK_SIZE {
            return Err(KeyWrapError::invalid_config(format!(
                "KEK size {} is below {MIN_KEK_SIZE}",
                self.kek_size
            )));
        }
        Ok(())
    }

    /// Circuit breaker settings derived from this configuration.
    #[must_use]
    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::default()
            .with_failure_threshold(self.circuit_breaker_threshold)
            .with_timeout(self.circuit_breaker_timeout)
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set KEK size.
    #[must_use]
    pub const fn with_kek_size(mut self, kek_size: u32) -> Self {
        self.kek_size = kek_size;
        self
    }

    /// Set circuit breaker threshold.
    #[must_use]
    pub const fn with_circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }
}
