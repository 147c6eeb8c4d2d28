//! Process-local DEK cache with sliding expiry and zero-fill on eviction.

use crate::config::EnvelopeConfig;
use crate::metrics::EnvelopeMetrics;
use crate::tenant::TenantId;
use envelope_kms_client::DataKey;
use lru::LruCache;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use zeroize::Zeroize;

/// Tenant to DEK cache.
///
/// Implementations must zero-fill key material on every eviction path and
/// be safe for concurrent use without external locking.
pub trait DekCache: Send + Sync {
    /// Copy of the cached DEK for `tenant`, refreshing its expiry.
    fn get(&self, tenant: &TenantId) -> Option<DataKey>;

    /// Cache `dek` for `tenant`, replacing any previous entry.
    fn put(&self, tenant: &TenantId, dek: DataKey);

    /// Drop the entry for `tenant`. Returns whether one was present.
    fn invalidate(&self, tenant: &TenantId) -> bool;

    /// Number of cached entries.
    fn len(&self) -> usize;

    /// Whether the cache is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionCause {
    /// Sliding window elapsed
    Expired,
    /// Least recently used entry pushed out at capacity
    Capacity,
    /// Explicit invalidation
    Invalidated,
    /// Overwritten by a newer key for the same tenant
    Replaced,
}

impl EvictionCause {
    /// Stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Expired => "expired",
            Self::Capacity => "capacity",
            Self::Invalidated => "invalidated",
            Self::Replaced => "replaced",
        }
    }
}

/// Longest sliding window a cached DEK may be held for.
pub const MAX_DEK_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

type EvictionListener = Box<dyn Fn(&TenantId, EvictionCause, &DataKey) + Send + Sync>;

struct CachedDek {
    key: DataKey,
    expires_at: Instant,
}

/// LRU-bounded in-memory [`DekCache`].
pub struct InMemoryDekCache {
    entries: Mutex<LruCache<TenantId, CachedDek>>,
    ttl: Duration,
    evictions: AtomicU64,
    metrics: EnvelopeMetrics,
    listener: Option<EvictionListener>,
}

impl InMemoryDekCache {
    /// Cache holding at most `capacity` tenants for a sliding `ttl`, capped
    /// at [`MAX_DEK_CACHE_TTL`].
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl: ttl.min(MAX_DEK_CACHE_TTL),
            evictions: AtomicU64::new(0),
            metrics: EnvelopeMetrics::new(),
            listener: None,
        }
    }

    /// Cache sized from `config`.
    #[must_use]
    pub fn from_config(config: &EnvelopeConfig) -> Self {
        Self::new(config.dek_cache_capacity, config.dek_cache_ttl)
    }

    /// Observe each evicted key after it has been zero-filled.
    ///
    /// The listener runs under the cache lock and must not call back into
    /// the cache.
    #[must_use]
    pub fn with_eviction_listener(
        mut self,
        listener: impl Fn(&TenantId, EvictionCause, &DataKey) + Send + Sync + 'static,
    ) -> Self {
        self.listener = Some(Box::new(listener));
        self
    }

    /// Total evictions so far.
    #[must_use]
    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }

    /// Evict every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let expired: Vec<TenantId> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at <= now)
            .map(|(tenant, _)| tenant.clone())
            .collect();

        for tenant in &expired {
            if let Some(entry) = entries.pop(tenant) {
                self.evict(tenant, entry, EvictionCause::Expired);
            }
        }
        expired.len()
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<TenantId, CachedDek>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn evict(&self, tenant: &TenantId, mut entry: CachedDek, cause: EvictionCause) {
        entry.key.zeroize();
        self.evictions.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_cache_eviction();
        if let Some(listener) = &self.listener {
            listener(tenant, cause, &entry.key);
        }
        debug!(tenant = %tenant, cause = cause.as_str(), "Evicted DEK");
    }
}

impl DekCache for InMemoryDekCache {
    fn get(&self, tenant: &TenantId) -> Option<DataKey> {
        let now = Instant::now();
        let mut entries = self.lock();

        match entries.get_mut(tenant) {
            None => return None,
            Some(entry) if entry.expires_at > now => {
                entry.expires_at = now + self.ttl;
                return Some(entry.key.clone());
            }
            Some(_) => {}
        }

        if let Some(entry) = entries.pop(tenant) {
            self.evict(tenant, entry, EvictionCause::Expired);
        }
        None
    }

    fn put(&self, tenant: &TenantId, dek: DataKey) {
        let entry = CachedDek {
            key: dek,
            expires_at: Instant::now() + self.ttl,
        };
        let displaced = self.lock().push(tenant.clone(), entry);

        if let Some((previous, old)) = displaced {
            let cause = if previous == *tenant {
                EvictionCause::Replaced
            } else {
                EvictionCause::Capacity
            };
            self.evict(&previous, old, cause);
        }
    }

    fn invalidate(&self, tenant: &TenantId) -> bool {
        let removed = self.lock().pop(tenant);
        match removed {
            Some(entry) => {
                self.evict(tenant, entry, EvictionCause::Invalidated);
                true
            }
            None => false,
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

impl fmt::Debug for InMemoryDekCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryDekCache")
            .field("len", &self.len())
            .field("ttl", &self.ttl)
            .field("evictions", &self.eviction_count())
            .finish_non_exhaustive()
    }
}
