//! Key-wrapping authority abstraction.

use crate::error::KeyWrapResult;
use crate::key::DataKey;
use crate::models::{KekId, KekProperties};
use async_trait::async_trait;

/// Wraps and unwraps DEKs under tenant KEKs, and manages KEK lifecycle.
///
/// Every method is a remote call; no KEK material is held locally.
#[async_trait]
pub trait KeyWrapper: Send + Sync {
    /// Wrap `dek` under the tenant's KEK `kek_id`.
    async fn wrap(&self, dek: &DataKey, kek_id: &KekId, tenant: &str) -> KeyWrapResult<Vec<u8>>;

    /// Recover a DEK previously wrapped under `kek_id`.
    async fn unwrap(&self, wrapped: &[u8], kek_id: &KekId, tenant: &str) -> KeyWrapResult<DataKey>;

    /// Provision a new wrap/unwrap-only KEK for `tenant`.
    async fn create_kek(&self, tenant: &str, properties: &KekProperties) -> KeyWrapResult<KekId>;

    /// Create a replacement KEK and soft-delete `old_kek_id`.
    ///
    /// DEKs wrapped under the old KEK are not re-wrapped here.
    async fn rotate_kek(&self, old_kek_id: &KekId, tenant: &str) -> KeyWrapResult<KekId>;

    /// Soft-delete a KEK.
    async fn retire_kek(&self, kek_id: &KekId, tenant: &str) -> KeyWrapResult<()>;
}
