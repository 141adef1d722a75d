use axum::{
    body::Body,
    http::{HeaderName, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Propagate or assign an `x-request-id` for every request.
///
/// The id is stored in request extensions (picked up by the trace span) and
/// echoed on the response.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let req_id_value = match req.headers().get(&X_REQUEST_ID) {
        Some(existing) => existing.clone(),
        None => HeaderValue::try_from(Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;
    res.headers_mut().insert(X_REQUEST_ID, req_id_value);
    res
}
