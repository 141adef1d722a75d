//! In-process memory tier.
//!
//! A bounded key/value map with per-entry TTL. When full, inserting a new key
//! evicts the oldest-inserted entry. Overwriting a key refreshes its value and
//! TTL but keeps its insertion position. Expired entries are never returned:
//! reads drop them lazily and a background sweep removes the rest.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Slot {
    value: Arc<Value>,
    expires_at: Instant,
    /// Insertion sequence; matches the live `order` entry for this key.
    seq: u64,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Slot>,
    /// Insertion order. May hold stale `(seq, key)` pairs for keys that were
    /// deleted or expired; those are skipped on eviction and compacted away.
    order: VecDeque<(u64, String)>,
    next_seq: u64,
}

impl Inner {
    fn is_live(&self, seq: u64, key: &str) -> bool {
        self.entries.get(key).is_some_and(|slot| slot.seq == seq)
    }

    fn evict_oldest(&mut self) -> Option<String> {
        while let Some((seq, key)) = self.order.pop_front() {
            if self.is_live(seq, &key) {
                self.entries.remove(&key);
                return Some(key);
            }
        }
        None
    }

    fn compact_if_needed(&mut self) {
        if self.order.len() > self.entries.len() * 2 + 64 {
            let entries = &self.entries;
            self.order
                .retain(|(seq, key)| entries.get(key).is_some_and(|slot| slot.seq == *seq));
        }
    }
}

/// Memory tier statistics.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Entries that are still live.
    pub active: usize,
    /// Entries past their TTL that have not been swept yet.
    pub expired: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    /// Entries dropped to make room for new keys.
    pub evictions: u64,
    /// Entries dropped because their TTL elapsed.
    pub expirations: u64,
}

/// Bounded in-process cache tier.
///
/// Thread-safe; one instance is shared by request handlers, the sweeper and
/// the warming job. Every operation holds the lock only for the map update.
pub struct MemoryTier {
    inner: Mutex<Inner>,
    capacity: usize,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl MemoryTier {
    /// Create a memory tier holding at most `capacity` entries.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
            default_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            expirations: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// TTL applied when callers do not pick one, e.g. on backfill.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a key. Expired entries are removed and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Arc<Value>> {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let found = inner
            .entries
            .get(key)
            .map(|slot| (slot.expires_at > now, Arc::clone(&slot.value)));
        let live = match found {
            Some((true, value)) => Some(value),
            Some((false, _)) => {
                inner.entries.remove(key);
                self.expirations.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => None,
        };
        drop(inner);

        match live {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value. Returns the key evicted to make room, if any.
    pub fn set(&self, key: &str, value: Arc<Value>, ttl: Duration) -> Option<String> {
        let expires_at = Instant::now() + ttl;
        let mut inner = self.inner.lock();

        if let Some(slot) = inner.entries.get_mut(key) {
            slot.value = value;
            slot.expires_at = expires_at;
            return None;
        }

        let evicted = if inner.entries.len() >= self.capacity {
            inner.evict_oldest()
        } else {
            None
        };
        if evicted.is_some() {
            self.evictions.fetch_add(1, Ordering::Relaxed);
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.push_back((seq, key.to_string()));
        inner.entries.insert(
            key.to_string(),
            Slot {
                value,
                expires_at,
                seq,
            },
        );
        inner.compact_if_needed();

        evicted
    }

    /// Remove a key. Returns `true` if it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.entries.remove(key).is_some();
        if removed {
            inner.compact_if_needed();
        }
        removed
    }

    /// Remove every entry.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Snapshot of the stored keys, in insertion order.
    ///
    /// May include keys that have expired but were not swept yet.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.inner.lock();
        inner
            .order
            .iter()
            .filter(|(seq, key)| inner.is_live(*seq, key))
            .map(|(_, key)| key.clone())
            .collect()
    }

    /// Remove every key containing `pattern` as a substring.
    pub fn remove_containing(&self, pattern: &str) -> usize {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| !key.contains(pattern));
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.compact_if_needed();
        }
        removed
    }

    /// Remove expired entries. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, slot| slot.expires_at > now);
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.compact_if_needed();
            self.expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn stats(&self) -> MemoryStats {
        let now = Instant::now();
        let inner = self.inner.lock();
        let expired = inner
            .entries
            .values()
            .filter(|slot| slot.expires_at <= now)
            .count();
        MemoryStats {
            active: inner.entries.len() - expired,
            expired,
            capacity: self.capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Spawn the periodic sweep. Stops when `shutdown` is cancelled.
    pub fn start_sweeper(
        self: Arc<Self>,
        period: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let removed = self.sweep();
                        if removed > 0 {
                            tracing::debug!(removed = removed, "memory cache sweep completed");
                        }
                        crate::metrics::set_cache_entries("memory", self.len());
                    }
                }
            }
            tracing::debug!("memory cache sweeper stopped");
        })
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}
