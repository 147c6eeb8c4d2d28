//! Secret store client for tenant key material.
//!
//! Persists opaque string secrets (wrapped DEK blobs, KEK references) by
//! name. Lookups distinguish an absent secret from a transient failure, and
//! creation is conditional so concurrent first writers cannot clobber each
//! other.

pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod models;
pub mod provider;

pub use client::VaultSecretStore;
pub use config::{VaultAuth, VaultConfig};
pub use error::{SecretStoreError, SecretStoreResult};
pub use memory::InMemorySecretStore;
pub use provider::{CreateOutcome, SecretLookup, SecretStore};
