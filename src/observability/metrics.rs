//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, denials, breaker state)
//! - Expose a Prometheus-compatible endpoint on its own bind address
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by method, status, route
//! - `gateway_request_duration_seconds` (histogram): latency by route
//! - `gateway_rate_limited_total` (counter): limiter denials by route
//! - `gateway_breaker_transitions_total` (counter): transitions by route, state
//! - `gateway_breaker_rejected_total` (counter): fast-fails by route
//! - `gateway_fallbacks_served_total` (counter): fallback bodies by route
//! - `gateway_rate_limit_buckets` (gauge): live token buckets
//!
//! # Design Decisions
//! - Helper functions keep label names consistent at every call site
//! - Rate-limit denials are labeled by route only; keys are unbounded
//!   cardinality and stay in logs

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and exporter.
///
/// Failure is logged and non-fatal: the gateway serves traffic without
/// metrics rather than refusing to start.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics exporter"),
    }
}

/// Record a completed request.
pub fn record_request(method: &str, status: u16, route: &str, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "route" => route.to_string(),
    )
    .increment(1);
    histogram!(
        "gateway_request_duration_seconds",
        "route" => route.to_string(),
    )
    .record(start.elapsed().as_secs_f64());
}

/// Record a rate-limit denial.
pub fn record_rate_limited(route: &str, key: &str) {
    tracing::warn!(route = %route, key = %key, "Rate limit exceeded");
    counter!(
        "gateway_rate_limited_total",
        "route" => route.to_string(),
    )
    .increment(1);
}

/// Record a circuit breaker state transition.
pub fn record_breaker_transition(route: &str, to: &'static str) {
    counter!(
        "gateway_breaker_transitions_total",
        "route" => route.to_string(),
        "to" => to,
    )
    .increment(1);
}

/// Record a request fast-failed by an open breaker.
pub fn record_breaker_rejected(route: &str) {
    counter!(
        "gateway_breaker_rejected_total",
        "route" => route.to_string(),
    )
    .increment(1);
}

/// Record a fallback body served in place of an upstream response.
pub fn record_fallback_served(route: &str) {
    counter!(
        "gateway_fallbacks_served_total",
        "route" => route.to_string(),
    )
    .increment(1);
}

/// Update the live token-bucket gauge.
pub fn set_live_buckets(count: usize) {
    gauge!("gateway_rate_limit_buckets").set(count as f64);
}
