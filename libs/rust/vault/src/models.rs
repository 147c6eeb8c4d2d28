//! Vault wire structures.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Payload stored under every secret path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSecret {
    /// The opaque secret value
    pub value: String,
}

/// KV v2 write request.
#[derive(Debug, Serialize)]
pub struct KvWriteRequest<'a> {
    /// Secret data
    pub data: StoredSecretRef<'a>,
    /// Write options; `cas: 0` makes the write conditional on absence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<KvWriteOptions>,
}

/// Borrowed form of [`StoredSecret`] for writes.
#[derive(Debug, Serialize)]
pub struct StoredSecretRef<'a> {
    /// The opaque secret value
    pub value: &'a str,
}

/// KV v2 write options.
#[derive(Debug, Serialize)]
pub struct KvWriteOptions {
    /// Required current version
    pub cas: u32,
}

/// KV v2 read response.
#[derive(Debug, Deserialize)]
pub struct KvReadResponse {
    /// Response body
    pub data: KvData,
}

/// KV v2 secret data and metadata.
#[derive(Debug, Deserialize)]
pub struct KvData {
    /// Stored payload, null for a deleted version
    pub data: Option<StoredSecret>,
    /// Version metadata
    pub metadata: KvMetadata,
}

/// KV v2 version metadata.
#[derive(Debug, Deserialize)]
pub struct KvMetadata {
    /// Version number
    pub version: u32,
    /// Deletion time, empty when live
    #[serde(default)]
    pub deletion_time: String,
    /// Whether the version was destroyed
    #[serde(default)]
    pub destroyed: bool,
}

impl KvMetadata {
    /// Whether this version is deleted or destroyed.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.destroyed || !self.deletion_time.is_empty()
    }
}

/// KV v2 metadata read response.
#[derive(Debug, Deserialize)]
pub struct KvMetadataResponse {
    /// Response body
    pub data: KvSecretMetadata,
}

/// Version history of one KV v2 secret.
#[derive(Debug, Deserialize)]
pub struct KvSecretMetadata {
    /// Latest version number
    pub current_version: u32,
    /// Per-version state keyed by version number
    #[serde(default)]
    pub versions: HashMap<String, KvVersionState>,
}

/// State of a single KV v2 version.
#[derive(Debug, Deserialize)]
pub struct KvVersionState {
    /// Deletion time, empty when live
    #[serde(default)]
    pub deletion_time: String,
    /// Whether the version was destroyed
    #[serde(default)]
    pub destroyed: bool,
}

impl KvSecretMetadata {
    /// The current version, if it is deleted or destroyed.
    #[must_use]
    pub fn deleted_current_version(&self) -> Option<u32> {
        self.versions
            .get(&self.current_version.to_string())
            .filter(|state| state.destroyed || !state.deletion_time.is_empty())
            .map(|_| self.current_version)
    }
}

/// Vault error body.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorResponse {
    /// Error messages
    #[serde(default)]
    pub errors: Vec<String>,
}

/// Vault auth response.
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    /// Auth block
    pub auth: AuthData,
}

/// Vault auth data.
#[derive(Debug, Deserialize)]
pub struct AuthData {
    /// Client token
    pub client_token: String,
    /// Token lease in seconds
    pub lease_duration: u64,
    /// Whether the token is renewable
    #[serde(default)]
    pub renewable: bool,
}
