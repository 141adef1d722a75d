use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use smartcity_core::{Domain, Record};
use smartcity_storage::{RecordQuery, RecordStore};

use crate::cache::{CacheStats, DashboardStats};
use crate::error::ApiError;
use crate::server::AppState;

/// Default and maximum page sizes for list and history views.
pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<usize>,
}

impl LimitParams {
    pub fn resolve(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

fn parse_domain(raw: &str) -> Result<Domain, ApiError> {
    Ok(raw.parse::<Domain>()?)
}

fn sensor_domain(raw: &str) -> Result<Domain, ApiError> {
    let domain = parse_domain(raw)?;
    if !domain.is_sensor() {
        return Err(ApiError::not_found(format!(
            "{domain} has no latest or history view"
        )));
    }
    Ok(domain)
}

pub async fn root() -> impl IntoResponse {
    let body = json!({
        "service": "Smart City API",
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    });
    (StatusCode::OK, Json(body))
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse { status: "ok" }))
}

pub async fn metrics() -> impl IntoResponse {
    match crate::metrics::render_metrics() {
        Some(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        None => ApiError::not_found("metrics are not enabled").into_response(),
    }
}

// ---- Records ----

pub async fn list_records(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let domain = parse_domain(&domain)?;
    let records = state
        .store
        .find(domain, &RecordQuery::newest(params.resolve()))
        .await?;
    Ok(Json(records))
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Record>), ApiError> {
    let domain = parse_domain(&domain)?;
    let record = state.store.insert(domain, payload).await?;
    tracing::info!(domain = %domain, id = %record.id, "record created");
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((domain, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Record>, ApiError> {
    let domain = parse_domain(&domain)?;
    let record = state.store.update(domain, &id, payload).await?;
    tracing::info!(domain = %domain, id = %id, "record updated");
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((domain, id)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let domain = parse_domain(&domain)?;
    state.store.delete(domain, &id).await?;
    tracing::info!(domain = %domain, id = %id, "record deleted");
    Ok(Json(json!({ "message": "Record deleted", "id": id })))
}

pub async fn latest_record(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<Option<Record>>, ApiError> {
    let domain = sensor_domain(&domain)?;
    Ok(Json(state.domains.latest(domain).await?))
}

pub async fn record_history(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<Record>>, ApiError> {
    let domain = sensor_domain(&domain)?;
    Ok(Json(state.domains.history(domain, params.resolve()).await?))
}

// ---- Dashboard & cache administration ----

pub async fn dashboard_stats(
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, ApiError> {
    Ok(Json(state.domains.dashboard_stats().await?))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    state.cache.probe().await;
    Json(state.cache.stats())
}

pub async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear().await;
    Json(json!({ "message": "Cache cleared successfully" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_defaults_and_clamps() {
        assert_eq!(LimitParams::default().resolve(), DEFAULT_LIMIT);
        assert_eq!(LimitParams { limit: Some(0) }.resolve(), 1);
        assert_eq!(LimitParams { limit: Some(5000) }.resolve(), MAX_LIMIT);
        assert_eq!(LimitParams { limit: Some(25) }.resolve(), 25);
    }

    #[test]
    fn test_history_only_for_sensor_domains() {
        assert_eq!(sensor_domain("air").unwrap(), Domain::Air);
        assert_eq!(
            sensor_domain("complaints").unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            sensor_domain("parking").unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }
}
