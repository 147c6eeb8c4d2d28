//! KEK identifiers, provisioning properties and Key Vault wire structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Wrapping algorithm requested from the key-management service.
pub const WRAP_ALGORITHM: &str = "RSA-OAEP-256";

/// Identifier of a tenant KEK. The service never holds more than this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KekId(String);

impl KekId {
    /// Fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Wrap an existing identifier, e.g. one read back from the secret store.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Key name used at the key-management service for a tenant KEK:
/// `kek-{tenant}-{kek_id}`, underscores normalized to hyphens, lowercased.
#[must_use]
pub fn kek_key_name(tenant: &str, kek_id: &KekId) -> String {
    format!("kek-{tenant}-{kek_id}")
        .replace('_', "-")
        .to_lowercase()
}

/// Properties of a KEK being provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KekProperties {
    /// RSA modulus size in bits
    pub key_size: u32,
    /// Expiry of the key
    pub expires_on: DateTime<Utc>,
    /// Extra tags merged with the mandatory audit tags
    pub tags: BTreeMap<String, String>,
}

impl KekProperties {
    /// Properties for a key of `key_size` bits expiring `lifetime` from now.
    #[must_use]
    pub fn new(key_size: u32, lifetime: Duration) -> Self {
        let lifetime = chrono::Duration::from_std(lifetime).unwrap_or(chrono::Duration::days(365));
        Self {
            key_size,
            expires_on: Utc::now() + lifetime,
            tags: BTreeMap::new(),
        }
    }

    /// Add a tag.
    #[must_use]
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Tags sent to the service: caller tags plus `tenant`, `purpose` and
    /// `created_at`, which always win.
    #[must_use]
    pub fn audit_tags(&self, tenant: &str) -> BTreeMap<String, String> {
        let mut tags = self.tags.clone();
        tags.insert("tenant".to_string(), tenant.to_string());
        tags.insert("purpose".to_string(), "dek-wrapping".to_string());
        tags.insert("created_at".to_string(), Utc::now().to_rfc3339());
        tags
    }
}

/// Key creation request.
#[derive(Debug, Serialize)]
pub struct CreateKeyRequest {
    /// Key type
    pub kty: &'static str,
    /// Modulus size
    pub key_size: u32,
    /// Permitted operations
    pub key_ops: [&'static str; 2],
    /// Key attributes
    pub attributes: KeyAttributes,
    /// Tags
    pub tags: BTreeMap<String, String>,
}

/// Key attributes.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeyAttributes {
    /// Whether the key is enabled
    pub enabled: bool,
    /// Expiry as Unix seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// Key bundle returned on creation.
#[derive(Debug, Deserialize)]
pub struct KeyBundle {
    /// JSON web key
    pub key: JsonWebKey,
}

/// Public part of a JSON web key.
#[derive(Debug, Deserialize)]
pub struct JsonWebKey {
    /// Full key identifier URL including version
    pub kid: String,
}

/// Wrap/unwrap request.
#[derive(Debug, Serialize)]
pub struct KeyOperationRequest<'a> {
    /// Algorithm
    pub alg: &'static str,
    /// Base64url-encoded input
    pub value: &'a str,
}

/// Wrap/unwrap response.
#[derive(Debug, Deserialize)]
pub struct KeyOperationResult {
    /// Key identifier used
    #[serde(default)]
    pub kid: String,
    /// Base64url-encoded output
    pub value: String,
}

/// Error body.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    /// Error details
    #[serde(default)]
    pub error: ErrorDetail,
}

/// Error detail.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorDetail {
    /// Error code
    #[serde(default)]
    pub code: String,
    /// Message
    #[serde(default)]
    pub message: String,
}
