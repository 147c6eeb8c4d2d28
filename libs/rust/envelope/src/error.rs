//! Envelope encryption error types.

use envelope_common::Retryable;
use envelope_kms_client::KeyWrapError;
use envelope_vault_client::SecretStoreError;
use thiserror::Error;

/// Errors surfaced to callers of the envelope crypto service.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    /// Ciphertext shorter than the minimum framing size
    #[error("Invalid envelope format: {len} bytes, minimum is {min}")]
    InvalidFormat {
        /// Length received
        len: usize,
        /// Minimum framed length
        min: usize,
    },

    /// Framing version byte not recognized
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// GCM tag did not verify
    #[error("Envelope authentication failed")]
    AuthenticationFailed,

    /// Wrapping a DEK at the key-management service failed
    #[error("DEK wrap failed: {0}")]
    WrapFailed(#[source] KeyWrapError),

    /// Unwrapping a stored DEK failed
    #[error("DEK unwrap failed: {0}")]
    UnwrapFailed(#[source] KeyWrapError),

    /// A key-management call other than wrap, unwrap or provisioning failed
    #[error("Key management failed: {0}")]
    KeyManagement(#[source] KeyWrapError),

    /// A secret expected to exist is absent
    #[error("Secret not found: {0}")]
    SecretNotFound(String),

    /// KEK creation failed
    #[error("Key provisioning failed: {0}")]
    KeyProvisioningFailed(#[source] KeyWrapError),

    /// The secret store failed; absence is never reported this way
    #[error("Secret store error: {0}")]
    SecretStore(#[from] SecretStoreError),

    /// Bad base64 or UTF-8 on a text surface
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// No tenant could be resolved for the operation
    #[error("Tenant unavailable: {0}")]
    TenantUnavailable(String),

    /// A remote call did not complete in time
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// AEAD failure while encrypting
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for envelope operations.
pub type EnvelopeResult<T> = Result<T, EnvelopeError>;

impl EnvelopeError {
    /// Create an invalid encoding error.
    #[must_use]
    pub fn invalid_encoding(msg: impl Into<String>) -> Self {
        Self::InvalidEncoding(msg.into())
    }

    /// Create a tenant unavailable error.
    #[must_use]
    pub fn tenant_unavailable(msg: impl Into<String>) -> Self {
        Self::TenantUnavailable(msg.into())
    }

    /// Create an invalid configuration error.
    #[must_use]
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Whether this error means the ciphertext is corrupt, forged, or was
    /// sealed under a different key.
    #[must_use]
    pub const fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidFormat { .. } | Self::UnsupportedVersion(_) | Self::AuthenticationFailed
        )
    }
}

impl From<KeyWrapError> for EnvelopeError {
    fn from(err: KeyWrapError) -> Self {
        match err {
            KeyWrapError::WrapFailed { .. } => Self::WrapFailed(err),
            KeyWrapError::UnwrapFailed { .. } => Self::UnwrapFailed(err),
            KeyWrapError::KeyProvisioningFailed { .. } => Self::KeyProvisioningFailed(err),
            _ => Self::KeyManagement(err),
        }
    }
}

impl Retryable for EnvelopeError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::WrapFailed(e)
            | Self::UnwrapFailed(e)
            | Self::KeyManagement(e)
            | Self::KeyProvisioningFailed(e) => e.is_retryable(),
            Self::SecretStore(e) => e.is_retryable(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}
