pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod observability;
pub mod server;
pub mod simulator;
pub mod ws;

use std::sync::Arc;

pub use auth::{Caller, JwtVerifier, Role, RoleGate};
pub use cache::{CacheService, DomainCache, MemoryTier, RedisTier};
pub use config::{AppConfig, CacheConfig, RedisConfig, ServerConfig};
pub use error::ApiError;
pub use observability::{apply_logging_level, init_tracing};
pub use server::{AppState, ServerBuilder, SmartCityServer, build_app};

/// Create the cache facade based on configuration.
///
/// ## Cache Modes
///
/// - **No `redis.url`**: memory tier only
/// - **`redis.url` set**: memory tier plus Redis, falling back to memory only
///   when Redis cannot be reached
///
/// The server starts and serves reads either way.
pub async fn create_cache_service(config: &AppConfig) -> Arc<CacheService> {
    let memory = Arc::new(MemoryTier::new(
        config.cache.max_entries,
        config.cache.default_ttl(),
    ));

    let Some(url) = config.redis.redacted_url() else {
        tracing::info!("Redis not configured, using memory cache only");
        return Arc::new(CacheService::memory_only(memory));
    };

    tracing::info!(url = %url, "Connecting to Redis");
    match RedisTier::connect(&config.redis).await {
        Ok(tier) => {
            tracing::info!("Connected to Redis, distributed cache tier enabled");
            Arc::new(
                CacheService::new(memory, Some(Arc::new(tier)))
                    .with_retry_backoff(config.redis.retry_backoff()),
            )
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to memory cache."
            );
            Arc::new(CacheService::memory_only(memory))
        }
    }
}
