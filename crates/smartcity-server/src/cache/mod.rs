//! Multi-tier read cache.
//!
//! ## Architecture
//!
//! - **Memory tier**: bounded, in-process, insertion-order eviction
//! - **Distributed tier** (optional): Redis, shared across instances
//! - **Facade**: [`CacheService`], one API over both tiers
//!
//! ## Cache Hierarchy
//!
//! ```text
//! GET request → memory → distributed → record store
//!                 ↓          ↓              ↓
//!             <1µs      ~1-5ms        query cost
//! ```
//!
//! Writes to the record store fire [`InvalidationTriggers`], which drop the
//! affected keys by substring. [`CacheWarmer`] refreshes hot keys on a timer
//! and [`read_through`] caches whole JSON responses.
//!
//! ## Graceful Degradation
//!
//! If Redis is unavailable or not configured, the facade runs memory-only.

pub mod distributed;
pub mod domain;
pub mod invalidation;
pub mod memory;
pub mod read_through;
pub mod redis_tier;
pub mod service;
pub mod warming;

pub use distributed::{DistributedTier, TierError};
pub use domain::{DashboardCounts, DashboardLatest, DashboardStats, DomainCache, DomainTtls};
pub use invalidation::{InvalidatingStore, InvalidationTriggers};
pub use memory::{MemoryStats, MemoryTier};
pub use read_through::{ReadThrough, read_through};
pub use redis_tier::RedisTier;
pub use service::{CacheService, CacheStats, DistributedStatus};
pub use warming::{CacheWarmer, WarmReport};
