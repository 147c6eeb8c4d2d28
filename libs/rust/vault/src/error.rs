//! Secret store error types using thiserror 2.0.
//!
//! An absent secret is not an error (see [`crate::SecretLookup`]); every
//! variant here is a failure to talk to the store, classified by whether a
//! retry may help.

use envelope_common::Retryable;
use thiserror::Error;

/// Secret store errors.
#[derive(Error, Debug)]
pub enum SecretStoreError {
    /// Store unreachable or returned a server error
    #[error("Secret store unavailable: {0}")]
    Unavailable(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Permission denied on a path
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Rate limited
    #[error("Rate limited")]
    RateLimited,

    /// Circuit breaker open
    #[error("Circuit breaker open")]
    CircuitBreakerOpen,

    /// Conditional write rejected because the secret already exists
    #[error("Secret already exists: {0}")]
    Conflict(String),

    /// Request timed out
    #[error("Request timed out: {0}")]
    Timeout(String),

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

/// Result type for secret store operations.
pub type SecretStoreResult<T> = Result<T, SecretStoreError>;

impl SecretStoreError {
    /// Create an unavailable error.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an authentication failed error.
    #[must_use]
    pub fn auth_failed(msg: impl Into<String>) -> Self {
        Self::AuthenticationFailed(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl Retryable for SecretStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::RateLimited | Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SecretStoreError::unavailable("connection refused");
        assert_eq!(err.to_string(), "Secret store unavailable: connection refused");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(SecretStoreError::unavailable("timeout").is_retryable());
        assert!(SecretStoreError::RateLimited.is_retryable());
        assert!(SecretStoreError::Timeout("read".to_string()).is_retryable());
        assert!(!SecretStoreError::Conflict("dek-t1".to_string()).is_retryable());
        assert!(!SecretStoreError::CircuitBreakerOpen.is_retryable());
        assert!(!SecretStoreError::PermissionDenied("path".to_string()).is_retryable());
    }
}
