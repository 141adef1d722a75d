//! Periodic cache warming.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use smartcity_core::Domain;
use smartcity_storage::StorageError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::domain::DomainCache;

/// Outcome of one warming pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmReport {
    pub warmed: usize,
    pub failed: usize,
}

/// Refreshes the hot keys (`{domain}:latest` for sensor domains and
/// `dashboard:stats`) on a fixed period.
///
/// Each refresh runs concurrently under its own timeout. A failing or slow
/// refresh is logged and does not affect the others.
pub struct CacheWarmer {
    domains: DomainCache,
    period: Duration,
    call_timeout: Duration,
}

impl CacheWarmer {
    pub fn new(domains: DomainCache, period: Duration, call_timeout: Duration) -> Self {
        Self {
            domains,
            period,
            call_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        target: String,
        fut: impl Future<Output = Result<T, StorageError>>,
    ) -> bool {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::warn!(target_key = %target, error = %e, "cache warming call failed");
                false
            }
            Err(_) => {
                tracing::warn!(
                    target_key = %target,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "cache warming call timed out"
                );
                false
            }
        }
    }

    /// Run one warming pass.
    pub async fn warm_once(&self) -> WarmReport {
        let latest = join_all(Domain::SENSORS.into_iter().map(|domain| {
            self.bounded(
                format!("{domain}:latest"),
                self.domains.refresh_latest(domain),
            )
        }));
        let dashboard = self.bounded(
            "dashboard:stats".to_string(),
            self.domains.refresh_dashboard_stats(),
        );

        let (latest, dashboard) = tokio::join!(latest, dashboard);

        let mut report = WarmReport::default();
        for ok in latest.into_iter().chain(std::iter::once(dashboard)) {
            if ok {
                report.warmed += 1;
            } else {
                report.failed += 1;
            }
        }
        report
    }

    /// Spawn the periodic warming task. Stops when `shutdown` is cancelled.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.period);
            // First tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        let report = self.warm_once().await;
                        if report.failed > 0 {
                            tracing::warn!(
                                warmed = report.warmed,
                                failed = report.failed,
                                "cache warming completed with failures"
                            );
                        } else {
                            tracing::info!(warmed = report.warmed, "cache warmed");
                        }
                    }
                }
            }
            tracing::debug!("cache warmer stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::domain::DomainTtls;
    use crate::cache::memory::MemoryTier;
    use crate::cache::service::CacheService;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use smartcity_core::Record;
    use smartcity_storage::{InMemoryRecordStore, RecordQuery, RecordStore};

    fn cache() -> Arc<CacheService> {
        Arc::new(CacheService::memory_only(Arc::new(MemoryTier::new(
            100,
            Duration::from_secs(300),
        ))))
    }

    /// Fails reads of one domain, hangs on another.
    struct FlakyStore {
        inner: InMemoryRecordStore,
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn insert(&self, domain: Domain, payload: Value) -> Result<Record, StorageError> {
            self.inner.insert(domain, payload).await
        }

        async fn update(
            &self,
            domain: Domain,
            id: &str,
            payload: Value,
        ) -> Result<Record, StorageError> {
            self.inner.update(domain, id, payload).await
        }

        async fn delete(&self, domain: Domain, id: &str) -> Result<(), StorageError> {
            self.inner.delete(domain, id).await
        }

        async fn find(
            &self,
            domain: Domain,
            query: &RecordQuery,
        ) -> Result<Vec<Record>, StorageError> {
            match domain {
                Domain::Waste => Err(StorageError::connection_error("waste shard down")),
                Domain::Energy => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    self.inner.find(domain, query).await
                }
                _ => self.inner.find(domain, query).await,
            }
        }

        async fn count(&self, domain: Domain) -> Result<u64, StorageError> {
            self.inner.count(domain).await
        }
    }

    #[tokio::test]
    async fn test_warm_once_populates_hot_keys() {
        let store = Arc::new(InMemoryRecordStore::new());
        store.insert(Domain::Air, json!({"AQI": 70})).await.unwrap();
        store
            .insert(Domain::Traffic, json!({"intensity": 3}))
            .await
            .unwrap();
        let cache = cache();
        let domains = DomainCache::new(cache.clone(), store, DomainTtls::default());
        let warmer = CacheWarmer::new(domains, Duration::from_secs(300), Duration::from_secs(1));

        let report = warmer.warm_once().await;
        assert_eq!(report, WarmReport { warmed: 5, failed: 0 });

        assert!(cache.get("air:latest").await.is_some());
        assert!(cache.get("traffic:latest").await.is_some());
        // Empty domains stay uncached
        assert!(cache.get("waste:latest").await.is_none());
        assert!(cache.get("dashboard:stats").await.is_some());
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let store = Arc::new(FlakyStore {
            inner: InMemoryRecordStore::new(),
        });
        store.insert(Domain::Air, json!({"AQI": 70})).await.unwrap();
        let cache = cache();
        let domains = DomainCache::new(cache.clone(), store, DomainTtls::default());
        let warmer = CacheWarmer::new(
            domains,
            Duration::from_secs(300),
            Duration::from_millis(100),
        );

        let report = warmer.warm_once().await;
        // waste fails, energy times out, dashboard needs both
        assert_eq!(report, WarmReport { warmed: 2, failed: 3 });
        assert!(cache.get("air:latest").await.is_some());
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let domains = DomainCache::new(
            cache(),
            Arc::new(InMemoryRecordStore::new()),
            DomainTtls::default(),
        );
        let warmer = Arc::new(CacheWarmer::new(
            domains,
            Duration::from_millis(10),
            Duration::from_secs(1),
        ));
        let shutdown = CancellationToken::new();
        let handle = warmer.start(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
