//! Distributed (shared) cache tier contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Errors raised by a distributed tier. The facade logs these and treats
/// them as a miss or a no-op; they never reach HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum TierError {
    #[error("distributed tier unavailable: {0}")]
    Unavailable(String),

    #[error("distributed tier call `{op}` timed out after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("connection pool error: {0}")]
    Pool(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A cache tier reached over the network.
///
/// Values are JSON payloads; implementations serialize them to text on write
/// and parse them back on read. Entries expire on the tier's own clock.
#[async_trait]
pub trait DistributedTier: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, TierError>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), TierError>;

    async fn delete(&self, key: &str) -> Result<(), TierError>;

    /// Remove every key in this tier's namespace.
    async fn clear(&self) -> Result<(), TierError>;

    /// Remove every key containing `pattern` as a substring. Returns the
    /// number of keys removed.
    async fn invalidate_containing(&self, pattern: &str) -> Result<usize, TierError>;

    async fn ping(&self) -> Result<(), TierError>;

    /// Release connections. Called once at shutdown.
    async fn close(&self) {}

    fn name(&self) -> &'static str;
}
