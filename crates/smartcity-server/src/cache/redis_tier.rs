//! Redis-backed distributed tier.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use serde_json::Value;

use super::distributed::{DistributedTier, TierError};
use crate::config::RedisConfig;

/// Distributed tier over a deadpool-managed Redis connection pool.
///
/// Keys are stored under `key_prefix`. Every call is bounded by `timeout`.
pub struct RedisTier {
    pool: Pool,
    prefix: String,
    timeout: Duration,
}

impl RedisTier {
    pub fn new(pool: Pool, prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
            timeout,
        }
    }

    /// Build the pool and verify that a connection can be checked out.
    pub async fn connect(config: &RedisConfig) -> Result<Self, TierError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| TierError::Unavailable("redis.url is not set".into()))?;

        let timeout = config.timeout();
        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| TierError::Pool(e.to_string()))?;

        let tier = Self::new(pool, config.key_prefix.clone(), timeout);
        tier.ping().await?;
        Ok(tier)
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, TierError> {
        self.pool
            .get()
            .await
            .map_err(|e| TierError::Pool(e.to_string()))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, TierError>
    where
        F: Future<Output = Result<T, TierError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(TierError::Timeout {
                op,
                after: self.timeout,
            }),
        }
    }

    async fn matching_keys(&self, glob: &str) -> Result<Vec<String>, TierError> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = redis::cmd("KEYS").arg(glob).query_async(&mut conn).await?;
        Ok(keys)
    }

    async fn delete_keys(&self, keys: &[String]) -> Result<usize, TierError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn().await?;
        let removed: usize = conn.del(keys).await?;
        Ok(removed)
    }
}

/// Millisecond expiry for `PSETEX`, which rejects zero.
pub(crate) fn expiry_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// Escape Redis glob metacharacters so `pattern` matches literally.
pub(crate) fn escape_glob(pattern: &str) -> String {
    let mut escaped = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if matches!(c, '\\' | '*' | '?' | '[' | ']') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl DistributedTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<Value>, TierError> {
        let full_key = self.full_key(key);
        self.bounded("get", async {
            let mut conn = self.conn().await?;
            let raw: Option<String> = conn.get(&full_key).await?;
            match raw {
                Some(text) => Ok(Some(serde_json::from_str(&text)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), TierError> {
        let full_key = self.full_key(key);
        let payload = serde_json::to_string(value)?;
        let ttl_ms = expiry_millis(ttl);
        self.bounded("set", async {
            let mut conn = self.conn().await?;
            conn.pset_ex::<_, _, ()>(&full_key, payload, ttl_ms).await?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        let full_key = self.full_key(key);
        self.bounded("delete", async {
            let mut conn = self.conn().await?;
            conn.del::<_, ()>(&full_key).await?;
            Ok(())
        })
        .await
    }

    async fn clear(&self) -> Result<(), TierError> {
        self.bounded("clear", async {
            if self.prefix.is_empty() {
                let mut conn = self.conn().await?;
                let _: () = redis::cmd("FLUSHDB").query_async(&mut conn).await?;
                return Ok(());
            }
            let glob = format!("{}*", escape_glob(&self.prefix));
            let keys = self.matching_keys(&glob).await?;
            self.delete_keys(&keys).await?;
            Ok(())
        })
        .await
    }

    async fn invalidate_containing(&self, pattern: &str) -> Result<usize, TierError> {
        let glob = format!("{}*{}*", escape_glob(&self.prefix), escape_glob(pattern));
        self.bounded("invalidate", async {
            let keys = self.matching_keys(&glob).await?;
            self.delete_keys(&keys).await
        })
        .await
    }

    async fn ping(&self) -> Result<(), TierError> {
        self.bounded("ping", async {
            let mut conn = self.conn().await?;
            let _: String = redis::cmd("PING").query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    async fn close(&self) {
        self.pool.close();
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

impl std::fmt::Debug for RedisTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisTier")
            .field("prefix", &self.prefix)
            .field("timeout", &self.timeout)
            .finish()
    }
}
