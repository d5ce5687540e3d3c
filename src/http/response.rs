//! Response constructors for the gateway's own HTTP surface.
//!
//! # Responsibilities
//! - Build the gateway-originated responses: 404, 429, 502, fallbacks
//! - Keep status/header conventions in one place
//!
//! # Design Decisions
//! - Retry-After is rounded up to whole seconds with a floor of 1, so
//!   the hint never undersells the wait
//! - Fallback status and content type were validated at load; anything
//!   that slips through degrades to a plain 503 rather than panicking

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::fallback::FallbackResponse;

/// 404 for requests no route predicate matched.
pub fn not_found() -> Response<Body> {
    (StatusCode::NOT_FOUND, "No matching route found\n").into_response()
}

/// 429 with a Retry-After hint for rate-limited requests.
pub fn too_many_requests(retry_after: Duration) -> Response<Body> {
    let secs = (retry_after.as_secs_f64().ceil() as u64).max(1);
    (
        StatusCode::TOO_MANY_REQUESTS,
        [(header::RETRY_AFTER, secs.to_string())],
        "Rate limit exceeded\n",
    )
        .into_response()
}

/// Generic 502 for upstream failures without a registered fallback.
pub fn bad_gateway() -> Response<Body> {
    (StatusCode::BAD_GATEWAY, "Upstream request failed\n").into_response()
}

/// A configured fallback body.
pub fn fallback(fallback: &FallbackResponse) -> Response<Body> {
    let status =
        StatusCode::from_u16(fallback.status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    let content_type = HeaderValue::from_str(&fallback.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("text/plain; charset=utf-8"));

    let mut response = (status, fallback.body.clone()).into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    response
}
