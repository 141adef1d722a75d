//! Integration tests for the Redis distributed tier.
//!
//! These tests verify the two-tier cache against a real Redis:
//! - memory tier in front
//! - Redis shared across facades (i.e. across instances)
//!
//! Tests use testcontainers and need a local Docker daemon.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use smartcity_server::cache::{CacheService, DistributedTier, MemoryTier, RedisTier};
use smartcity_server::{AppConfig, RedisConfig, create_cache_service};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::redis::Redis;
use tokio::sync::OnceCell;

// Shared Redis container for all tests
static SHARED_REDIS: OnceCell<(ContainerAsync<Redis>, String)> = OnceCell::const_new();

async fn get_redis_url() -> String {
    let (_, url) = SHARED_REDIS
        .get_or_init(|| async {
            let container = Redis::default()
                .start()
                .await
                .expect("start redis container");

            let host_port = container.get_host_port_ipv4(6379).await.expect("get port");
            let url = format!("redis://127.0.0.1:{host_port}");

            (container, url)
        })
        .await;

    url.clone()
}

/// Each test gets its own namespace so they can share one container.
async fn redis_config(prefix: &str) -> RedisConfig {
    RedisConfig {
        url: Some(get_redis_url().await),
        key_prefix: format!("test:{prefix}:"),
        ..RedisConfig::default()
    }
}

async fn two_tier(config: &RedisConfig) -> Arc<CacheService> {
    let tier = RedisTier::connect(config).await.expect("connect redis");
    let memory = Arc::new(MemoryTier::new(100, Duration::from_secs(300)));
    Arc::new(CacheService::new(memory, Some(Arc::new(tier))))
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_values_survive_json_round_trip() {
    let tier = RedisTier::connect(&redis_config("roundtrip").await)
        .await
        .unwrap();
    let value = json!({"AQI": 151, "city": "Lucknow", "tags": ["a", "b"], "ok": true, "n": null});

    tier.set("air:latest", &value, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(tier.get("air:latest").await.unwrap(), Some(value));
    assert_eq!(tier.get("air:missing").await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_ttl_expires() {
    let tier = RedisTier::connect(&redis_config("ttl").await).await.unwrap();

    tier.set("short", &json!(1), Duration::from_secs(1))
        .await
        .unwrap();
    assert!(tier.get("short").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(2100)).await;
    assert!(tier.get("short").await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_sub_second_ttl_is_not_rounded_up() {
    let config = redis_config("ttl-ms").await;
    let tier = RedisTier::connect(&config).await.unwrap();

    tier.set("blink", &json!(1), Duration::from_millis(300))
        .await
        .unwrap();
    assert!(tier.get("blink").await.unwrap().is_some());

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(tier.get("blink").await.unwrap().is_none());

    // Expired in both tiers, so no backfill resurrects it
    let cache = two_tier(&config).await;
    cache
        .set("flash", json!({"AQI": 40}), Duration::from_millis(300))
        .await;
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(cache.get("flash").await.is_none());
    assert_eq!(cache.memory().len(), 0);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_second_instance_backfills_from_redis() {
    let config = redis_config("shared").await;
    let writer = two_tier(&config).await;
    let reader = two_tier(&config).await;

    writer
        .set("dashboard:stats", json!({"air": 1}), Duration::from_secs(60))
        .await;

    assert_eq!(reader.memory().len(), 0);
    assert_eq!(
        reader.get("dashboard:stats").await.as_deref(),
        Some(&json!({"air": 1}))
    );
    // Copied into the reader's memory tier
    assert_eq!(reader.memory().len(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_invalidation_reaches_every_instance() {
    let config = redis_config("invalidate").await;
    let a = two_tier(&config).await;
    let b = two_tier(&config).await;
    let ttl = Duration::from_secs(60);

    a.set("air:latest", json!({"AQI": 1}), ttl).await;
    a.set("cache:/api/air:{}", json!([]), ttl).await;
    a.set("traffic:latest", json!({"intensity": 1}), ttl).await;

    b.invalidate_pattern("air").await;

    // a still holds its own memory copy; the shared tier is clean
    let fresh = two_tier(&config).await;
    assert!(fresh.get("air:latest").await.is_none());
    assert!(fresh.get("cache:/api/air:{}").await.is_none());
    assert!(fresh.get("traffic:latest").await.is_some());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_glob_characters_in_patterns_are_literal() {
    let tier = RedisTier::connect(&redis_config("glob").await).await.unwrap();
    let ttl = Duration::from_secs(60);

    tier.set("cache:/api/air:{\"limit\":\"5\"}", &json!([]), ttl)
        .await
        .unwrap();
    tier.set("cache:/api/air:{}", &json!([]), ttl).await.unwrap();

    assert_eq!(tier.invalidate_containing("[l]imit").await.unwrap(), 0);
    assert_eq!(tier.invalidate_containing("*").await.unwrap(), 0);
    assert_eq!(tier.invalidate_containing("\"limit\"").await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_clear_only_touches_own_namespace() {
    let mine = RedisTier::connect(&redis_config("clear-a").await).await.unwrap();
    let other = RedisTier::connect(&redis_config("clear-b").await).await.unwrap();
    let ttl = Duration::from_secs(60);

    mine.set("k", &json!(1), ttl).await.unwrap();
    other.set("k", &json!(2), ttl).await.unwrap();

    mine.clear().await.unwrap();
    assert!(mine.get("k").await.unwrap().is_none());
    assert_eq!(other.get("k").await.unwrap(), Some(json!(2)));
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_create_cache_service_connects() {
    let mut cfg = AppConfig::default();
    cfg.redis = redis_config("factory").await;

    let cache = create_cache_service(&cfg).await;
    assert!(cache.has_distributed());
    assert!(cache.probe().await);
    assert_eq!(cache.stats().distributed.backend, Some("redis"));

    cache.shutdown().await;
}
