//! Write-triggered cache invalidation.
//!
//! After a successful write to a domain, every key containing one of the
//! domain's patterns is removed from both tiers. The pattern map is static.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use smartcity_core::{Domain, Record};
use smartcity_storage::{RecordQuery, RecordStore, StorageError};

use super::service::CacheService;

/// Maps a written domain to the cache patterns it invalidates.
pub struct InvalidationTriggers {
    cache: Arc<CacheService>,
}

impl InvalidationTriggers {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self { cache }
    }

    /// Patterns removed after a write to `domain`.
    pub fn patterns_for(domain: Domain) -> &'static [&'static str] {
        match domain {
            Domain::Air => &["air:latest", "air:history", "dashboard:stats"],
            Domain::Traffic => &["traffic:latest", "traffic:history", "dashboard:stats"],
            Domain::Waste => &["waste:latest", "waste:history", "dashboard:stats"],
            Domain::Energy => &["energy:latest", "energy:history", "dashboard:stats"],
            Domain::Incident | Domain::Complaint | Domain::Announcement => &[],
        }
    }

    /// Invalidate every pattern of `domain`. Returns the number of keys removed.
    pub async fn invalidate(&self, domain: Domain) -> usize {
        let patterns = Self::patterns_for(domain);
        let mut removed = 0;
        for pattern in patterns {
            removed += self.cache.invalidate_pattern(pattern).await;
        }
        if !patterns.is_empty() {
            tracing::debug!(domain = %domain, removed = removed, "cache invalidation fired");
        }
        removed
    }
}

/// A store wrapper that fires [`InvalidationTriggers`] after each successful
/// write, before returning to the caller.
pub struct InvalidatingStore<S: RecordStore> {
    inner: S,
    triggers: Arc<InvalidationTriggers>,
}

impl<S: RecordStore> InvalidatingStore<S> {
    pub fn new(inner: S, triggers: Arc<InvalidationTriggers>) -> Self {
        Self { inner, triggers }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for InvalidatingStore<S> {
    async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError> {
        let record = self.inner.insert(domain, payload).await?;
        self.triggers.invalidate(domain).await;
        crate::metrics::record_write(domain.as_str(), "create");
        Ok(record)
    }

    async fn update(
        &self,
        domain: Domain,
        id: &str,
        payload: Value,
    ) -> Result<Record, StorageError> {
        let record = self.inner.update(domain, id, payload).await?;
        self.triggers.invalidate(domain).await;
        crate::metrics::record_write(domain.as_str(), "update");
        Ok(record)
    }

    async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError> {
        self.inner.delete(domain, id).await?;
        self.triggers.invalidate(domain).await;
        crate::metrics::record_write(domain.as_str(), "delete");
        Ok(())
    }

    async fn find(&self, domain: Domain, query: &RecordQuery) -> Result<Vec<Record>, StorageError> {
        self.inner.find(domain, query).await
    }

    async fn count(&self, domain: Domain) -> Result<u64, StorageError> {
        self.inner.count(domain).await
    }

    async fn latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        self.inner.latest(domain).await
    }
}
