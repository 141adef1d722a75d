//! Domain-level cache helpers.
//!
//! Each helper owns one key scheme and TTL:
//!
//! | Helper              | Key                        | TTL (default) |
//! |---------------------|----------------------------|---------------|
//! | `latest`            | `{domain}:latest`          | 60s           |
//! | `history`           | `{domain}:history:{limit}` | 300s          |
//! | `dashboard_stats`   | `dashboard:stats`          | 180s          |
//!
//! Record-store failures propagate to the caller. Cache failures never do.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use smartcity_core::{Domain, Record};
use smartcity_storage::{DynRecordStore, RecordQuery, StorageError};
use time::OffsetDateTime;

use super::service::CacheService;
use crate::config::DomainTtlConfig;

pub const DASHBOARD_STATS_KEY: &str = "dashboard:stats";

/// Domains summarised on the dashboard.
pub const DASHBOARD_DOMAINS: [Domain; 5] = [
    Domain::Air,
    Domain::Traffic,
    Domain::Waste,
    Domain::Energy,
    Domain::Incident,
];

pub fn latest_key(domain: Domain) -> String {
    format!("{domain}:latest")
}

pub fn history_key(domain: Domain, limit: usize) -> String {
    format!("{domain}:history:{limit}")
}

#[derive(Debug, Clone, Copy)]
pub struct DomainTtls {
    pub latest: Duration,
    pub history: Duration,
    pub dashboard: Duration,
}

impl From<&DomainTtlConfig> for DomainTtls {
    fn from(cfg: &DomainTtlConfig) -> Self {
        Self {
            latest: Duration::from_secs(cfg.latest_secs),
            history: Duration::from_secs(cfg.history_secs),
            dashboard: Duration::from_secs(cfg.dashboard_secs),
        }
    }
}

impl Default for DomainTtls {
    fn default() -> Self {
        Self::from(&DomainTtlConfig::default())
    }
}

/// Record counts per dashboard domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardCounts {
    pub air: u64,
    pub traffic: u64,
    pub waste: u64,
    pub energy: u64,
    pub incidents: u64,
}

/// Newest record per dashboard domain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardLatest {
    pub air: Option<Record>,
    pub traffic: Option<Record>,
    pub waste: Option<Record>,
    pub energy: Option<Record>,
    pub incidents: Option<Record>,
}

/// Composite dashboard payload: `{counts, latest, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub counts: DashboardCounts,
    pub latest: DashboardLatest,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Cached views over the record store.
#[derive(Clone)]
pub struct DomainCache {
    cache: Arc<CacheService>,
    store: DynRecordStore,
    ttls: DomainTtls,
}

impl DomainCache {
    pub fn new(cache: Arc<CacheService>, store: DynRecordStore, ttls: DomainTtls) -> Self {
        Self { cache, store, ttls }
    }

    pub fn ttls(&self) -> DomainTtls {
        self.ttls
    }

    /// Newest record of a domain.
    ///
    /// An empty domain yields `None`, which is not cached: the next call
    /// asks the store again.
    pub async fn latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        if let Some(record) = self.cache.get_as::<Record>(&latest_key(domain)).await {
            return Ok(Some(record));
        }
        self.refresh_latest(domain).await
    }

    /// Read the newest record from the store and cache it, bypassing any
    /// cached value.
    pub async fn refresh_latest(&self, domain: Domain) -> Result<Option<Record>, StorageError> {
        let record = self.store.latest(domain).await?;
        if let Some(record) = &record {
            self.cache
                .set_as(&latest_key(domain), record, self.ttls.latest)
                .await;
        }
        Ok(record)
    }

    /// Up to `limit` records of a domain, newest first.
    pub async fn history(&self, domain: Domain, limit: usize) -> Result<Vec<Record>, StorageError> {
        let key = history_key(domain, limit);
        if let Some(records) = self.cache.get_as::<Vec<Record>>(&key).await {
            return Ok(records);
        }

        let records = self.store.find(domain, &RecordQuery::newest(limit)).await?;
        self.cache.set_as(&key, &records, self.ttls.history).await;
        Ok(records)
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, StorageError> {
        if let Some(stats) = self.cache.get_as::<DashboardStats>(DASHBOARD_STATS_KEY).await {
            return Ok(stats);
        }
        self.refresh_dashboard_stats().await
    }

    /// Recompute the dashboard payload and cache it, bypassing any cached
    /// value.
    pub async fn refresh_dashboard_stats(&self) -> Result<DashboardStats, StorageError> {
        let [air, traffic, waste, energy, incidents] = DASHBOARD_DOMAINS;
        let (
            (air_count, air),
            (traffic_count, traffic),
            (waste_count, waste),
            (energy_count, energy),
            (incident_count, incidents),
        ) = tokio::try_join!(
            self.summary(air),
            self.summary(traffic),
            self.summary(waste),
            self.summary(energy),
            self.summary(incidents),
        )?;

        let stats = DashboardStats {
            counts: DashboardCounts {
                air: air_count,
                traffic: traffic_count,
                waste: waste_count,
                energy: energy_count,
                incidents: incident_count,
            },
            latest: DashboardLatest {
                air,
                traffic,
                waste,
                energy,
                incidents,
            },
            timestamp: OffsetDateTime::now_utc(),
        };
        self.cache
            .set_as(DASHBOARD_STATS_KEY, &stats, self.ttls.dashboard)
            .await;
        Ok(stats)
    }

    async fn summary(&self, domain: Domain) -> Result<(u64, Option<Record>), StorageError> {
        tokio::try_join!(self.store.count(domain), self.store.latest(domain))
    }
}

impl std::fmt::Debug for DomainCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainCache")
            .field("ttls", &self.ttls)
            .finish()
    }
}
