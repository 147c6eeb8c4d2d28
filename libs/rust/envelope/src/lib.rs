//! Tenant-scoped envelope encryption.
//!
//! Field-level data at or above [`DataClassification::OfficialSensitive`]
//! is sealed with AES-256-GCM under a per-tenant DEK. DEKs are persisted
//! only wrapped under a per-tenant KEK held by the key-management service,
//! and are cached in process for a short sliding window.
//!
//! ```text
//! caller -> EnvelopeCryptoService -> DekCache (hit)
//!                                  -> SecretStore + KeyWrapper (miss)
//!                                  -> AES-256-GCM -> version || nonce || tag || ciphertext
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cache;
pub mod classification;
pub mod config;
pub mod envelope;
pub mod error;
pub mod metrics;
pub mod service;
mod stored_dek;
pub mod tenant;

pub use cache::{DekCache, EvictionCause, InMemoryDekCache, MAX_DEK_CACHE_TTL};
pub use classification::{ClassificationMap, DataClassification, requires_protection};
pub use config::EnvelopeConfig;
pub use envelope::{ENVELOPE_VERSION, Envelope, MIN_ENVELOPE_LEN, NONCE_LEN, TAG_LEN};
pub use error::{EnvelopeError, EnvelopeResult};
pub use metrics::{EnvelopeMetrics, LifecycleEvent};
pub use service::EnvelopeCryptoService;
pub use tenant::{StaticTenantResolver, TaskLocalTenantResolver, TenantId, TenantResolver, with_tenant};
