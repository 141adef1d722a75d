//! Read-through response caching middleware.
//!
//! GET responses are cached under `cache:{path}:{canonical query}` where the
//! canonical query is a JSON object with parameters sorted by name. Headers
//! are ignored, so two requests that differ only in headers share a key.
//!
//! On a hit the handler does not run. On a miss the handler's response is
//! inspected: only successful JSON responses are stored, with the TTL fixed
//! when the layer was built. The payload reaches the client unchanged.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json,
    body::{Body, HttpBody},
    extract::{Request, State},
    http::{HeaderValue, Method, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::service::CacheService;
use crate::error::ApiError;

/// Header reporting whether a response came from the cache.
pub const X_CACHE: &str = "x-cache";

/// Read-through middleware state.
#[derive(Clone)]
pub struct ReadThrough {
    cache: Arc<CacheService>,
    ttl: Duration,
    max_body: usize,
}

impl ReadThrough {
    pub fn new(cache: Arc<CacheService>, ttl: Duration) -> Self {
        Self {
            cache,
            ttl,
            max_body: 4 * 1024 * 1024,
        }
    }

    /// Responses larger than `max_body` bytes pass through uncached.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

/// Build the cache key for a request path and raw query string.
///
/// A parameter given once maps to a string, a repeated one to an array of
/// strings in request order.
pub fn cache_key(path: &str, query: Option<&str>) -> String {
    let mut params: BTreeMap<String, Value> = BTreeMap::new();

    for (name, value) in url::form_urlencoded::parse(query.unwrap_or("").as_bytes()) {
        let value = Value::String(value.into_owned());
        match params.entry(name.into_owned()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Array(values) => values.push(value),
                existing => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            },
        }
    }

    let canonical = serde_json::to_string(&params).unwrap_or_else(|_| "{}".to_string());
    format!("cache:{path}:{canonical}")
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"))
}

/// Middleware entry point, used with `axum::middleware::from_fn_with_state`.
pub async fn read_through(State(rt): State<ReadThrough>, req: Request, next: Next) -> Response {
    if req.method() != Method::GET {
        return next.run(req).await;
    }

    let key = cache_key(req.uri().path(), req.uri().query());

    if let Some(cached) = rt.cache.get(&key).await {
        let mut response = Json(&*cached).into_response();
        response
            .headers_mut()
            .insert(X_CACHE, HeaderValue::from_static("HIT"));
        return response;
    }

    let response = next.run(req).await;

    if !response.status().is_success() || !is_json(&response) {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let fits = body
        .size_hint()
        .upper()
        .is_some_and(|len| len <= rt.max_body as u64);
    if !fits {
        tracing::debug!(key = %key, "response too large to cache");
        return Response::from_parts(parts, body);
    }

    let bytes = match axum::body::to_bytes(body, rt.max_body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "failed to buffer response body");
            return ApiError::internal("Server error").into_response();
        }
    };

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(payload) => rt.cache.set(&key, payload, rt.ttl).await,
        Err(e) => tracing::warn!(key = %key, error = %e, "response is not valid JSON, not cached"),
    }

    parts
        .headers
        .insert(X_CACHE, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}
