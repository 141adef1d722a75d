//! End-to-end cache behaviour through the public API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use smartcity_server::cache::{
    CacheService, DistributedTier, DomainCache, DomainTtls, InvalidatingStore,
    InvalidationTriggers, MemoryTier, TierError,
};
use smartcity_storage::{Domain, DynRecordStore, InMemoryRecordStore, RecordStore};

fn memory_cache(capacity: usize) -> Arc<CacheService> {
    Arc::new(CacheService::memory_only(Arc::new(MemoryTier::new(
        capacity,
        Duration::from_secs(300),
    ))))
}

/// A distributed tier whose backend is down.
struct DownTier;

#[async_trait]
impl DistributedTier for DownTier {
    async fn get(&self, _key: &str) -> Result<Option<Value>, TierError> {
        Err(TierError::Unavailable("connection refused".into()))
    }

    async fn set(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), TierError> {
        Err(TierError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<(), TierError> {
        Err(TierError::Unavailable("connection refused".into()))
    }

    async fn clear(&self) -> Result<(), TierError> {
        Err(TierError::Unavailable("connection refused".into()))
    }

    async fn invalidate_containing(&self, _pattern: &str) -> Result<usize, TierError> {
        Err(TierError::Timeout {
            op: "invalidate",
            after: Duration::from_millis(10),
        })
    }

    async fn ping(&self) -> Result<(), TierError> {
        Err(TierError::Unavailable("connection refused".into()))
    }

    fn name(&self) -> &'static str {
        "down"
    }
}

#[tokio::test]
async fn entries_expire_after_their_ttl() {
    let cache = memory_cache(100);

    cache.set("a", json!({"x": 1}), Duration::from_secs(1)).await;
    assert_eq!(cache.get("a").await.as_deref(), Some(&json!({"x": 1})));

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(cache.get("a").await.is_none());
}

#[tokio::test]
async fn write_invalidates_absent_latest() {
    let cache = memory_cache(100);
    let triggers = Arc::new(InvalidationTriggers::new(cache.clone()));
    let store: DynRecordStore = Arc::new(InvalidatingStore::new(
        InMemoryRecordStore::new(),
        triggers,
    ));
    let domains = DomainCache::new(cache.clone(), store.clone(), DomainTtls::default());

    assert!(domains.latest(Domain::Traffic).await.unwrap().is_none());

    let record = store
        .insert(Domain::Traffic, json!({"intensity": 77, "status": "Heavy"}))
        .await
        .unwrap();

    let latest = domains.latest(Domain::Traffic).await.unwrap().unwrap();
    assert_eq!(latest.id, record.id);

    // A later write replaces the cached value
    let newer = store
        .insert(Domain::Traffic, json!({"intensity": 12, "status": "Light"}))
        .await
        .unwrap();
    let latest = domains.latest(Domain::Traffic).await.unwrap().unwrap();
    assert_eq!(latest.id, newer.id);
}

#[tokio::test]
async fn full_memory_tier_evicts_oldest_insert() {
    let cache = memory_cache(2);
    let ttl = Duration::from_secs(60);

    cache.set("k1", json!(1), ttl).await;
    cache.set("k2", json!(2), ttl).await;
    cache.set("k3", json!(3), ttl).await;

    assert!(cache.get("k1").await.is_none());
    assert!(cache.get("k2").await.is_some());
    assert!(cache.get("k3").await.is_some());
}

#[tokio::test]
async fn pattern_invalidation_matches_substrings() {
    let cache = memory_cache(100);
    let ttl = Duration::from_secs(60);

    cache.set("air:latest", json!({"AQI": 80}), ttl).await;
    cache.set("cache:/api/air:{}", json!([]), ttl).await;
    cache.set("traffic:latest", json!({"intensity": 5}), ttl).await;

    assert_eq!(cache.invalidate_pattern("air").await, 2);

    assert!(cache.get("air:latest").await.is_none());
    assert!(cache.get("cache:/api/air:{}").await.is_none());
    assert!(cache.get("traffic:latest").await.is_some());

    assert_eq!(cache.invalidate_pattern("parking").await, 0);
}

#[tokio::test]
async fn unavailable_distributed_tier_degrades_to_memory() {
    let memory = Arc::new(MemoryTier::new(100, Duration::from_secs(300)));
    let cache = Arc::new(CacheService::new(memory, Some(Arc::new(DownTier))));

    cache
        .set("energy:latest", json!({"usage": 420}), Duration::from_secs(60))
        .await;
    assert_eq!(
        cache.get("energy:latest").await.as_deref(),
        Some(&json!({"usage": 420}))
    );
    assert!(cache.get("waste:latest").await.is_none());
    assert_eq!(cache.invalidate_pattern("energy").await, 1);

    assert!(!cache.probe().await);
    let stats = cache.stats();
    assert!(stats.distributed.configured);
    assert!(!stats.distributed.available);

    // Store reads still work with the tier down
    let store: DynRecordStore = Arc::new(InMemoryRecordStore::new());
    store.insert(Domain::Waste, json!({"level": 55})).await.unwrap();
    let domains = DomainCache::new(cache, store, DomainTtls::default());
    let stats = domains.dashboard_stats().await.unwrap();
    assert_eq!(stats.counts.waste, 1);
}
