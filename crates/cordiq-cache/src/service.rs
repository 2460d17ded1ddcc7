//! Response cache facade.
//!
//! The cache is advisory: every failure (backend down, corrupt entry,
//! serialization error) is logged and turned into a miss or a no-op, so an
//! outage only removes the speed-up and never breaks the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::CacheBackend;
use crate::key::{DEFAULT_KEY_PREFIX, belongs_to, cache_key, invalidation_pattern};
use crate::Result;

/// Default lifetime of a cached response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(3600);

/// Hit/miss counters accumulated since the previous read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetrics {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that found nothing usable, including failed lookups.
    pub misses: u64,
    /// `hits + misses`.
    pub total: u64,
    /// `hits / total`, or 0 when nothing was looked up.
    pub hit_rate: f64,
}

impl CacheMetrics {
    #[allow(clippy::cast_precision_loss)]
    fn from_counts(hits: u64, misses: u64) -> Self {
        let total = hits + misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        };
        Self {
            hits,
            misses,
            total,
            hit_rate,
        }
    }
}

/// Cache for expensive responses keyed by a normalized request context.
///
/// Counters are owned by the instance, so independent services (for example
/// in tests) never share metrics.
pub struct ResponseCacheService<B> {
    backend: B,
    prefix: String,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<B: CacheBackend> ResponseCacheService<B> {
    /// Creates a service over `backend` using the default prefix and TTL.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prefix: DEFAULT_KEY_PREFIX.to_string(),
            ttl: DEFAULT_TTL,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Overrides the entry lifetime. Backends expire in whole seconds, so a
    /// fractional lifetime is rounded up.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Overrides the key prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Returns the underlying backend.
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// Connects the backend. Returns false (and logs) on failure.
    pub async fn connect(&self) -> bool {
        match self.backend.connect().await {
            Ok(()) => {
                debug!("Response cache connected");
                true
            }
            Err(e) => {
                warn!("Response cache connection failed: {e}");
                false
            }
        }
    }

    /// Closes the backend. Failures are logged.
    pub async fn close(&self) {
        if let Err(e) = self.backend.close().await {
            warn!("Failed to close response cache: {e}");
        }
    }

    /// Derives the cache key for a `(user, contact, context)` triple.
    #[must_use]
    pub fn key(&self, user_id: &str, contact_id: &str, context: &Value) -> String {
        cache_key(&self.prefix, user_id, contact_id, context)
    }

    /// Looks up `key`.
    ///
    /// Returns `None` when the key is absent, the backend fails or the stored
    /// value cannot be decoded; all three count as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.try_get(key).await {
            Ok(Some(value)) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit: {key}");
                Some(value)
            }
            Ok(None) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss: {key}");
                None
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                warn!("Cache lookup failed for {key}: {e}");
                None
            }
        }
    }

    /// Stores `value` under `key` for the configured TTL. Failures are logged.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_set(key, value).await {
            warn!("Cache write failed for {key}: {e}");
        }
    }

    /// Removes every entry of a `(user, contact)` pair. Failures are logged.
    pub async fn invalidate(&self, user_id: &str, contact_id: &str) {
        match self.try_invalidate(user_id, contact_id).await {
            Ok(removed) => {
                debug!("Invalidated {removed} cache entries for {user_id}/{contact_id}");
            }
            Err(e) => warn!("Cache invalidation failed for {user_id}/{contact_id}: {e}"),
        }
    }

    /// Returns the counters accumulated since the last call and resets them.
    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.hits.swap(0, Ordering::Relaxed);
        let misses = self.misses.swap(0, Ordering::Relaxed);
        CacheMetrics::from_counts(hits, misses)
    }

    async fn try_get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.backend.get(key).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    async fn try_set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;
        self.backend
            .set_with_expiry(key, self.ttl_secs(), &raw)
            .await
    }

    fn ttl_secs(&self) -> u64 {
        let secs = self.ttl.as_secs();
        if self.ttl.subsec_nanos() > 0 {
            secs.saturating_add(1)
        } else {
            secs
        }
    }

    async fn try_invalidate(&self, user_id: &str, contact_id: &str) -> Result<u64> {
        let pattern = invalidation_pattern(&self.prefix, user_id, contact_id);
        let keys: Vec<String> = self
            .backend
            .keys_matching(&pattern)
            .await?
            .into_iter()
            .filter(|key| belongs_to(key, &self.prefix, user_id, contact_id))
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }
        self.backend.delete_many(&keys).await
    }
}
