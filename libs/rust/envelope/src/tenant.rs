//! Tenant identity and resolution.

use crate::error::{EnvelopeError, EnvelopeResult};
use std::fmt;
use std::future::Future;

/// Opaque tenant identifier; every key artifact is namespaced by it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    /// Validate and wrap a tenant identifier. Surrounding whitespace is
    /// trimmed.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TenantUnavailable`] if the identifier is
    /// empty.
    pub fn new(id: impl AsRef<str>) -> EnvelopeResult<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(EnvelopeError::tenant_unavailable("tenant id is empty"));
        }
        Ok(Self(id.to_string()))
    }

    /// Identifier as given.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Secret name holding the wrapped DEK.
    #[must_use]
    pub fn dek_secret_name(&self) -> String {
        format!("dek-{}", self.0).to_lowercase()
    }

    /// Secret name holding the current KEK id.
    #[must_use]
    pub fn kek_ref_secret_name(&self) -> String {
        format!("kek-ref-{}", self.0).to_lowercase()
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Supplies the tenant for the operation in progress.
pub trait TenantResolver: Send + Sync {
    /// Tenant of the current request.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::TenantUnavailable`] when no tenant is known.
    fn current_tenant(&self) -> EnvelopeResult<TenantId>;
}

/// Resolver that always answers with one tenant.
#[derive(Debug, Clone)]
pub struct StaticTenantResolver(TenantId);

impl StaticTenantResolver {
    /// Resolve every call to `tenant`.
    #[must_use]
    pub const fn new(tenant: TenantId) -> Self {
        Self(tenant)
    }
}

impl TenantResolver for StaticTenantResolver {
    fn current_tenant(&self) -> EnvelopeResult<TenantId> {
        Ok(self.0.clone())
    }
}

tokio::task_local! {
    static CURRENT_TENANT: TenantId;
}

/// Run `future` with `tenant` as the task-local current tenant.
pub async fn with_tenant<F: Future>(tenant: TenantId, future: F) -> F::Output {
    CURRENT_TENANT.scope(tenant, future).await
}

/// Resolver reading the tenant set by [`with_tenant`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskLocalTenantResolver;

impl TenantResolver for TaskLocalTenantResolver {
    fn current_tenant(&self) -> EnvelopeResult<TenantId> {
        CURRENT_TENANT
            .try_with(Clone::clone)
            .map_err(|_| EnvelopeError::tenant_unavailable("no tenant in task context"))
    }
}
