//! Prometheus counters for requests, the cache and record writes.
//!
//! Recording is a no-op until [`init_metrics`] installs the exporter, so the
//! cache and store code call these helpers unconditionally.

use std::sync::OnceLock;
use std::time::{Duration, Instant};

use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static EXPORTER: OnceLock<PrometheusHandle> = OnceLock::new();

pub mod names {
    pub const HTTP_REQUESTS_TOTAL: &str = "http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";

    pub const CACHE_HITS_TOTAL: &str = "cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "cache_misses_total";
    pub const CACHE_INVALIDATIONS_TOTAL: &str = "cache_invalidations_total";
    pub const CACHE_ENTRIES: &str = "cache_entries";

    pub const RECORD_WRITES_TOTAL: &str = "record_writes_total";
}

/// Install the Prometheus recorder. Returns `false` when one is already
/// installed or installation fails.
pub fn init_metrics() -> bool {
    if EXPORTER.get().is_some() {
        return false;
    }

    let handle = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::error!(error = %e, "could not install Prometheus recorder");
            return false;
        }
    };

    let installed = EXPORTER.set(handle).is_ok();
    if installed {
        tracing::info!("Prometheus metrics enabled at /metrics");
    }
    installed
}

/// Text exposition of every metric, or `None` before [`init_metrics`].
pub fn render_metrics() -> Option<String> {
    EXPORTER.get().map(PrometheusHandle::render)
}

// ---- HTTP ----

pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    let route = normalize_path(path);

    counter!(
        names::HTTP_REQUESTS_TOTAL,
        "method" => method.to_owned(),
        "route" => route.clone(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::HTTP_REQUEST_DURATION_SECONDS,
        "method" => method.to_owned(),
        "route" => route
    )
    .record(duration.as_secs_f64());
}

/// Middleware recording request count and latency.
pub async fn track_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(req).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

// ---- Cache ----

pub fn record_cache_hit(tier: &str) {
    counter!(names::CACHE_HITS_TOTAL, "tier" => tier.to_owned()).increment(1);
}

pub fn record_cache_miss() {
    counter!(names::CACHE_MISSES_TOTAL).increment(1);
}

/// Count keys dropped by one pattern invalidation.
pub fn record_cache_invalidation(pattern: &str, removed: usize) {
    counter!(names::CACHE_INVALIDATIONS_TOTAL, "pattern" => pattern.to_owned())
        .increment(removed as u64);
}

pub fn set_cache_entries(tier: &str, count: usize) {
    gauge!(names::CACHE_ENTRIES, "tier" => tier.to_owned()).set(count as f64);
}

// ---- Records ----

pub fn record_write(domain: &str, operation: &str) {
    counter!(
        names::RECORD_WRITES_TOTAL,
        "domain" => domain.to_owned(),
        "operation" => operation.to_owned()
    )
    .increment(1);
}

/// Collapse record ids so each route has one label value.
///
/// `/api/traffic/3f2a...` becomes `/api/traffic/{id}`; the fixed `latest`,
/// `history`, `stats` and `clear` segments are kept.
fn normalize_path(path: &str) -> String {
    let mut segments = path.split('/');
    match (segments.next(), segments.next(), segments.next(), segments.next(), segments.next()) {
        (Some(""), Some("api"), Some(domain), Some(third), None)
            if !third.is_empty() && !matches!(third, "latest" | "history" | "stats" | "clear") =>
        {
            format!("/api/{domain}/{{id}}")
        }
        _ => path.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_collapsed() {
        assert_eq!(
            normalize_path("/api/traffic/550e8400-e29b-41d4-a716-446655440000"),
            "/api/traffic/{id}"
        );
        assert_eq!(normalize_path("/api/air/latest"), "/api/air/latest");
        assert_eq!(normalize_path("/api/dashboard/stats"), "/api/dashboard/stats");
        assert_eq!(normalize_path("/api/cache/clear"), "/api/cache/clear");
        assert_eq!(normalize_path("/api/waste"), "/api/waste");
        assert_eq!(normalize_path("/api/waste/"), "/api/waste/");
        assert_eq!(normalize_path("/healthz"), "/healthz");
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        record_cache_hit("memory");
        record_cache_miss();
        record_cache_invalidation("air:latest", 2);
        set_cache_entries("memory", 3);
        record_write("air", "create");
    }
}
