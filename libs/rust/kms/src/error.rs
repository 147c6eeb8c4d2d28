//! Key-wrapping error types.

use envelope_common::Retryable;
use thiserror::Error;

/// Errors from the key-wrapping authority.
#[derive(Error, Debug)]
pub enum KeyWrapError {
    /// Wrapping a DEK failed
    #[error("Wrap failed with KEK {kek_id}: {source}")]
    WrapFailed {
        /// KEK identifier
        kek_id: String,
        /// Underlying failure
        #[source]
        source: Box<KeyWrapError>,
    },

    /// Unwrapping a DEK failed
    #[error("Unwrap failed with KEK {kek_id}: {source}")]
    UnwrapFailed {
        /// KEK identifier
        kek_id: String,
        /// Underlying failure
        #[source]
        source: Box<KeyWrapError>,
    },

    /// Creating a KEK failed
    #[error("Key provisioning failed for tenant {tenant}: {source}")]
    KeyProvisioningFailed {
        /// Tenant the KEK was being created for
        tenant: String,
        /// Underlying failure
        #[source]
        source: Box<KeyWrapError>,
    },

    /// The named key does not exist or is soft-deleted
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// The service rejected our credentials
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The service answered with something that is not valid key material
    #[error("Invalid key material: {0}")]
    InvalidKeyMaterial(String),

    /// The service rejected the request
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// Service unreachable or returned a server error
    #[error("Key management service unavailable: {0}")]
    Unavailable(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for key-wrapping operations.
pub type KeyWrapResult<T> = Result<T, KeyWrapError>;

impl KeyWrapError {
    /// Wrap `source` as a wrap failure for `kek_id`.
    #[must_use]
    pub fn wrap_failed(kek_id: impl Into<String>, source: Self) -> Self {
        Self::WrapFailed {
            kek_id: kek_id.into(),
            source: Box::new(source),
        }
    }

    /// Wrap `source` as an unwrap failure for `kek_id`.
    #[must_use]
    pub fn unwrap_failed(kek_id: impl Into<String>, source: Self) -> Self {
        Self::UnwrapFailed {
            kek_id: kek_id.into(),
            source: Box::new(source),
        }
    }

    /// Wrap `source` as a provisioning failure for `tenant`.
    #[must_use]
    pub fn provisioning_failed(tenant: impl Into<String>, source: Self) -> Self {
        Self::KeyProvisioningFailed {
            tenant: tenant.into(),
            source: Box::new(source),
        }
    }

    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl Retryable for KeyWrapError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::WrapFailed { source, .. }
            | Self::UnwrapFailed { source, .. }
            | Self::KeyProvisioningFailed { source, .. } => source.is_retryable(),
            Self::Unavailable(_) | Self::RateLimited => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
