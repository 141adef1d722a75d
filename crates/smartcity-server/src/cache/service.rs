//! Cache facade over the memory tier and the optional distributed tier.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::distributed::{DistributedTier, TierError};
use super::memory::{MemoryStats, MemoryTier};

/// Two-tier cache: memory first, then the distributed tier.
///
/// ## Lookup Order
///
/// 1. Memory tier, no I/O
/// 2. Distributed tier, one network round trip
///
/// A distributed hit is copied back into memory with the memory tier's
/// default TTL, not the TTL it was originally stored with.
///
/// ## Failure Handling
///
/// Distributed-tier errors are logged and mapped to a miss or a no-op.
/// Callers never observe them.
///
/// After a failure the distributed tier is skipped for `retry_backoff` so a
/// dead Redis does not add its timeout to every request. `clear` and
/// [`probe`](Self::probe) always try the tier; a successful probe ends the
/// backoff early.
pub struct CacheService {
    memory: Arc<MemoryTier>,
    distributed: Option<Arc<dyn DistributedTier>>,
    distributed_up: AtomicBool,
    retry_backoff: Duration,
    retry_at: Mutex<Option<Instant>>,
}

pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub memory: MemoryStats,
    pub distributed: DistributedStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributedStatus {
    pub configured: bool,
    pub available: bool,
    pub backend: Option<&'static str>,
}

impl CacheService {
    pub fn new(memory: Arc<MemoryTier>, distributed: Option<Arc<dyn DistributedTier>>) -> Self {
        let up = distributed.is_some();
        Self {
            memory,
            distributed,
            distributed_up: AtomicBool::new(up),
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            retry_at: Mutex::new(None),
        }
    }

    /// How long to skip the distributed tier after a failed call.
    /// `Duration::ZERO` retries on every call.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Create a facade without a distributed tier.
    pub fn memory_only(memory: Arc<MemoryTier>) -> Self {
        Self::new(memory, None)
    }

    pub fn memory(&self) -> &Arc<MemoryTier> {
        &self.memory
    }

    pub fn has_distributed(&self) -> bool {
        self.distributed.is_some()
    }

    /// The distributed tier, unless a recent failure put it in backoff.
    fn active_tier(&self) -> Option<&Arc<dyn DistributedTier>> {
        let tier = self.distributed.as_ref()?;
        let mut retry_at = self.retry_at.lock();
        match *retry_at {
            Some(at) if Instant::now() < at => None,
            Some(_) => {
                *retry_at = None;
                Some(tier)
            }
            None => Some(tier),
        }
    }

    fn observe<T>(&self, op: &str, key: &str, result: Result<T, TierError>) -> Option<T> {
        match result {
            Ok(value) => {
                self.distributed_up.store(true, Ordering::Relaxed);
                *self.retry_at.lock() = None;
                Some(value)
            }
            Err(e) => {
                self.distributed_up.store(false, Ordering::Relaxed);
                if !self.retry_backoff.is_zero() {
                    *self.retry_at.lock() = Some(Instant::now() + self.retry_backoff);
                }
                tracing::warn!(
                    op = op,
                    key = %key,
                    error = %e,
                    backoff_ms = self.retry_backoff.as_millis() as u64,
                    "distributed cache call failed"
                );
                None
            }
        }
    }

    /// Get a value from the cache.
    pub async fn get(&self, key: &str) -> Option<Arc<Value>> {
        if let Some(value) = self.memory.get(key) {
            tracing::debug!(key = %key, "cache hit (memory)");
            crate::metrics::record_cache_hit("memory");
            return Some(value);
        }

        let Some(tier) = self.active_tier() else {
            tracing::debug!(key = %key, "cache miss");
            crate::metrics::record_cache_miss();
            return None;
        };

        match self.observe("get", key, tier.get(key).await).flatten() {
            Some(value) => {
                tracing::debug!(key = %key, "cache hit (distributed)");
                crate::metrics::record_cache_hit(tier.name());

                let value = Arc::new(value);
                self.memory
                    .set(key, Arc::clone(&value), self.memory.default_ttl());
                Some(value)
            }
            None => {
                tracing::debug!(key = %key, "cache miss");
                crate::metrics::record_cache_miss();
                None
            }
        }
    }

    /// Get a value and deserialize it. Payloads that do not fit `T` are
    /// reported as a miss.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match T::deserialize(&*value) {
            Ok(typed) => Some(typed),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached payload has unexpected shape");
                None
            }
        }
    }

    /// Set a value in both tiers with the same TTL.
    ///
    /// The memory write always lands. A distributed failure is logged and
    /// does not undo it.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        let value = Arc::new(value);
        if let Some(evicted) = self.memory.set(key, Arc::clone(&value), ttl) {
            tracing::debug!(key = %evicted, "memory cache evicted oldest entry");
        }

        if let Some(tier) = self.active_tier() {
            let result = tier.set(key, &value, ttl).await;
            if self.observe("set", key, result).is_some() {
                tracing::debug!(
                    key = %key,
                    ttl_ms = ttl.as_millis() as u64,
                    "cache set (memory+distributed)"
                );
            }
        }
    }

    /// Serialize and store a value.
    pub async fn set_as<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl).await,
            Err(e) => tracing::warn!(key = %key, error = %e, "failed to serialize cache payload"),
        }
    }

    /// Remove a key from both tiers.
    pub async fn delete(&self, key: &str) {
        self.memory.delete(key);
        if let Some(tier) = self.active_tier() {
            let result = tier.delete(key).await;
            self.observe("delete", key, result);
        }
        tracing::debug!(key = %key, "cache entry deleted");
    }

    /// Remove every entry from both tiers.
    pub async fn clear(&self) {
        self.memory.clear();
        crate::metrics::set_cache_entries("memory", 0);
        if let Some(tier) = &self.distributed {
            let result = tier.clear().await;
            self.observe("clear", "*", result);
        }
        tracing::info!("cache cleared");
    }

    /// Remove every key containing `pattern` from both tiers.
    ///
    /// Skipped in the distributed tier while it is backed off; keys left
    /// there expire by their TTL.
    ///
    /// This is substring matching: `air:latest` also removes a key such as
    /// `cache:/api/repair:latest`. Returns the number of keys removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> usize {
        let mut removed = self.memory.remove_containing(pattern);

        if let Some(tier) = self.active_tier() {
            let result = tier.invalidate_containing(pattern).await;
            removed += self.observe("invalidate", pattern, result).unwrap_or(0);
        }

        if removed > 0 {
            tracing::debug!(pattern = %pattern, removed = removed, "cache invalidated");
            crate::metrics::record_cache_invalidation(pattern, removed);
        }
        removed
    }

    /// Ping the distributed tier and record whether it answered. Ignores
    /// the backoff.
    pub async fn probe(&self) -> bool {
        match &self.distributed {
            Some(tier) => {
                let result = tier.ping().await;
                self.observe("ping", "-", result).is_some()
            }
            None => false,
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory: self.memory.stats(),
            distributed: DistributedStatus {
                configured: self.distributed.is_some(),
                available: self.distributed.is_some()
                    && self.distributed_up.load(Ordering::Relaxed),
                backend: self.distributed.as_ref().map(|tier| tier.name()),
            },
        }
    }

    /// Flush the memory tier and release distributed connections.
    pub async fn shutdown(&self) {
        self.memory.clear();
        if let Some(tier) = &self.distributed {
            tier.close().await;
        }
        tracing::info!("cache shut down");
    }
}

impl std::fmt::Debug for CacheService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheService")
            .field("memory", &self.memory)
            .field(
                "distributed",
                &self.distributed.as_ref().map(|tier| tier.name()),
            )
            .finish()
    }
}
