//! Key-wrapping authority client.
//!
//! Tenant KEKs live entirely inside the key-management service; this crate
//! only ever holds their identifiers. DEKs cross the boundary to be wrapped
//! or unwrapped and are never logged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod error;
pub mod key;
pub mod memory;
pub mod models;
pub mod provider;

pub use client::KeyVaultWrapper;
pub use config::KeyVaultConfig;
pub use error::{KeyWrapError, KeyWrapResult};
pub use key::{DEK_LEN, DataKey};
pub use memory::InMemoryKeyWrapper;
pub use models::{KekId, KekProperties, kek_key_name};
pub use provider::KeyWrapper;
