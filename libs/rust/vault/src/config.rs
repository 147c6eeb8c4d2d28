//! Vault client configuration.

use crate::error::{SecretStoreError, SecretStoreResult};
use envelope_common::CircuitBreakerConfig;
use secrecy::SecretString;
use std::env;
use std::time::Duration;

/// How the client obtains a Vault token.
#[derive(Debug, Clone)]
pub enum VaultAuth {
    /// Kubernetes auth method using the pod's service account JWT
    Kubernetes {
        /// Vault role bound to the service account
        role: String,
        /// Service account token path
        token_path: String,
    },
    /// Pre-issued token
    Token(SecretString),
}

/// Vault client configuration.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub addr: String,
    /// KV v2 mount holding tenant key material
    pub kv_mount: String,
    /// Authentication method
    pub auth: VaultAuth,
    /// Request timeout
    pub timeout: Duration,
    /// Retries for read requests
    pub max_retries: u32,
    /// Base retry delay
    pub retry_delay: Duration,
    /// Re-authenticate when the token has less than this left
    pub grace_period: Duration,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout
    pub circuit_breaker_timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            addr: "https://vault.vault.svc:8200".to_string(),
            kv_mount: "secret".to_string(),
            auth: VaultAuth::Kubernetes {
                role: String::new(),
                token_path: "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string(),
            },
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_delay: Duration::from_millis(100),
            grace_period: Duration::from_secs(300),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(30),
        }
    }
}

impl VaultConfig {
    /// Create a configuration using a pre-issued token.
    #[must_use]
    pub fn with_token(addr: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            auth: VaultAuth::Token(SecretString::from(token.into())),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `VAULT_TOKEN` takes precedence over Kubernetes auth (`VAULT_ROLE`).
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(addr) = env::var("VAULT_ADDR") {
            config.addr = addr;
        }
        if let Ok(mount) = env::var("VAULT_KV_MOUNT") {
            config.kv_mount = mount;
        }
        if let Ok(token) = env::var("VAULT_TOKEN") {
            config.auth = VaultAuth::Token(SecretString::from(token));
        } else if let VaultAuth::Kubernetes { role, .. } = &mut config.auth {
            *role = env::var("VAULT_ROLE").unwrap_or_default();
        }
        if let Some(secs) = env::var("VAULT_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()) {
            config.timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the address, mount or Kubernetes role is missing.
    pub fn validate(&self) -> SecretStoreResult<()> {
        if self.addr.is_empty() {
            return Err(SecretStoreError::invalid_config("Vault address is empty"));
        }
        if self.kv_mount.is_empty() {
            return Err(SecretStoreError::invalid_config("KV mount is empty"));
        }
        if let VaultAuth::Kubernetes { role, .. } = &self.auth {
            if role.is_empty() {
                return Err(SecretStoreError::invalid_config("Kubernetes auth role is empty"));
            }
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

    /// Set the KV mount.
    #[must_use]
    pub fn with_kv_mount(mut self, mount: impl Into<String>) -> Self {
        self.kv_mount = mount.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set read retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set circuit breaker threshold.
    #[must_use]
    pub const fn with_circuit_breaker_threshold(mut self, threshold: u32) -> Self {
        self.circuit_breaker_threshold = threshold;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = VaultConfig::default();
        assert_eq!(config.kv_mount, "secret");
        assert_eq!(config.grace_period, Duration::from_secs(300));
        assert_eq!(config.circuit_breaker_threshold, 5);
    }

    #[test]
    fn test_kubernetes_auth_requires_role() {
        assert!(VaultConfig::default().validate().is_err());
        assert!(VaultConfig::with_token("http://127.0.0.1:8200", "root").validate().is_ok());
    }

    #[test]
    fn test_empty_mount_rejected() {
        let config = VaultConfig::with_token("http://127.0.0.1:8200", "root").with_kv_mount("");
        assert!(config.validate().is_err());
    }
}
