//! Mock IoT feeds.
//!
//! Periodically inserts randomized sensor readings through the regular write
//! path, so invalidation and the real-time feed fire exactly as they do for
//! API writes.

use std::time::Duration;

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value, json};
use smartcity_core::Domain;
use smartcity_storage::{DynRecordStore, RecordStore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::SimulatorConfig;

const CITY: &str = "Lucknow";
const CITY_CENTER: (f64, f64) = (26.8467, 80.9462);
const WASTE_ZONES: [(f64, f64); 5] = [
    (26.8500, 80.9499),
    (26.8600, 80.9399),
    (26.8400, 80.9599),
    (26.8700, 80.9299),
    (26.8300, 80.9699),
];

fn pick(rng: &mut impl Rng, options: &[&'static str]) -> &'static str {
    options.choose(rng).copied().unwrap_or_default()
}

/// Build one random reading for a sensor domain.
pub fn reading(domain: Domain) -> Option<Value> {
    let mut rng = rand::thread_rng();
    let value = match domain {
        Domain::Traffic => json!({
            "location": {
                "name": CITY,
                "lat": CITY_CENTER.0 + rng.gen_range(-0.05..0.05),
                "lng": CITY_CENTER.1 + rng.gen_range(-0.05..0.05),
            },
            "intensity": rng.gen_range(10..=100),
            "status": pick(&mut rng, &["Light", "Moderate", "Heavy", "Critical"]),
        }),
        Domain::Waste => {
            let zone = rng.gen_range(1..=WASTE_ZONES.len());
            let (lat, lng) = WASTE_ZONES[zone - 1];
            json!({
                "zone": format!("Zone-{zone}"),
                "level": rng.gen_range(20..=100),
                "status": pick(&mut rng, &["Normal", "Full", "Overflow"]),
                "location": { "lat": lat, "lng": lng },
            })
        }
        Domain::Energy => json!({
            "sector": pick(&mut rng, &["Residential", "Commercial", "Industrial"]),
            "usage": rng.gen_range(100..=1000),
            "status": pick(&mut rng, &["Normal", "High Load", "Critical"]),
        }),
        Domain::Air => json!({
            "city": CITY,
            "AQI": rng.gen_range(50..=400),
            "category": pick(&mut rng, &["Good", "Moderate", "Unhealthy", "Hazardous"]),
        }),
        Domain::Incident | Domain::Complaint | Domain::Announcement => return None,
    };
    Some(value)
}

/// Spawn one feed per sensor domain. Each stops when `shutdown` is cancelled.
pub fn start(
    store: DynRecordStore,
    config: &SimulatorConfig,
    shutdown: CancellationToken,
) -> Vec<JoinHandle<()>> {
    let feeds = [
        (Domain::Traffic, config.traffic_secs),
        (Domain::Waste, config.waste_secs),
        (Domain::Energy, config.energy_secs),
        (Domain::Air, config.air_secs),
    ];

    feeds
        .into_iter()
        .map(|(domain, secs)| {
            spawn_feed(
                store.clone(),
                domain,
                Duration::from_secs(secs),
                shutdown.clone(),
            )
        })
        .collect()
}

fn spawn_feed(
    store: DynRecordStore,
    domain: Domain,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.tick().await;
        tracing::info!(domain = %domain, period_secs = period.as_secs(), "sensor feed started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let Some(payload) = reading(domain) else { break };
                    match store.insert(domain, payload).await {
                        Ok(record) => {
                            tracing::debug!(domain = %domain, id = %record.id, "simulated reading stored");
                        }
                        Err(e) => {
                            tracing::warn!(domain = %domain, error = %e, "failed to store simulated reading");
                        }
                    }
                }
            }
        }
    })
}
