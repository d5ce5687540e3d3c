//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection limits).
    pub listener: ListenerConfig,

    /// Timeout configuration for the shared upstream client and the
    /// outer request timeout layer.
    pub timeouts: TimeoutConfig,

    /// Rate-limit key resolution strategy.
    pub resolver: ResolverConfig,

    /// Route definitions, evaluated in file order (first match wins).
    pub routes: Vec<RouteConfig>,

    /// Static fallback responses, referenced by routes via `fallback_id`.
    pub fallbacks: Vec<FallbackConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

/// Timeout configuration for various operations.
///
/// Per-route upstream timeouts live on [`RouteConfig::timeout_ms`]; the
/// values here cover the shared HTTP client and the whole-request ceiling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total in-gateway request timeout in seconds. Should exceed every
    /// route's `timeout_ms`.
    pub request_secs: u64,

    /// Idle timeout for pooled upstream connections in seconds.
    pub idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            idle_secs: 60,
        }
    }
}

/// Rate-limit key resolution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Strategy selector: `header:<name>`, `remote-ip`, or
    /// `constant[:<value>]`.
    ///
    /// The default is a single shared key, which makes rate limiting
    /// effectively global across clients. That matches the deployment this
    /// gateway replaces; switch to `header:...` or `remote-ip` for
    /// per-client limiting.
    pub strategy: String,

    /// Key used when the configured request attribute is absent (e.g. the
    /// header is missing). A config field so the catch-all partition is a
    /// visible policy choice rather than a hardcoded constant.
    pub fallback_key: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strategy: "constant:userkey".to_string(),
            fallback_key: "anonymous".to_string(),
        }
    }
}

/// Route configuration mapping requests to an upstream service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Unique route identifier for logging/metrics and state keying.
    pub id: String,

    /// HTTP methods to match (e.g., ["GET", "POST"]). Absent = any method.
    #[serde(default)]
    pub methods: Option<Vec<String>>,

    /// Path prefix to match (case-sensitive). Absent = any path.
    #[serde(default)]
    pub path_prefix: Option<String>,

    /// Host header to match (exact, case-insensitive). Absent = any host.
    #[serde(default)]
    pub host: Option<String>,

    /// Upstream base URL (e.g., "http://127.0.0.1:3000").
    pub upstream: String,

    /// Upstream response timeout in milliseconds.
    #[serde(default = "default_route_timeout_ms")]
    pub timeout_ms: u64,

    /// Token-bucket policy for this route.
    #[serde(default)]
    pub rate_limit: LimiterConfig,

    /// Circuit-breaker policy for this route.
    #[serde(default)]
    pub circuit_breaker: BreakerConfig,

    /// Fallback response served when the breaker is open or the upstream
    /// fails. Absent or unregistered = generic 502.
    #[serde(default)]
    pub fallback_id: Option<String>,
}

fn default_route_timeout_ms() -> u64 {
    10_000
}

/// Token-bucket rate limiter policy.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct LimiterConfig {
    /// Bucket capacity (burst size). Must be >= 1.
    pub capacity: u32,

    /// Tokens refilled per second. Must be > 0.
    pub refill_per_sec: f64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            capacity: 100,
            refill_per_sec: 50.0,
        }
    }
}

/// Circuit-breaker policy.
///
/// Defaults mirror the breaker configuration the replaced deployment ran
/// with: 50% failure rate over a 100-call window, 60s open, 10 probes.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Failure rate in (0, 1] at which the breaker opens.
    pub failure_rate_threshold: f64,

    /// Number of recent call outcomes kept in the sliding window.
    pub sliding_window: usize,

    /// Minimum outcomes in the window before the failure rate is
    /// evaluated. Must not exceed `sliding_window`.
    pub minimum_calls: usize,

    /// How long the breaker stays open before probing, in milliseconds.
    pub open_duration_ms: u64,

    /// Number of probe calls allowed through in half-open state.
    pub half_open_trials: usize,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window: 100,
            minimum_calls: 100,
            open_duration_ms: 60_000,
            half_open_trials: 10,
        }
    }
}

/// A static fallback response.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FallbackConfig {
    /// Identifier referenced by `RouteConfig::fallback_id`.
    pub id: String,

    /// HTTP status code to serve.
    #[serde(default = "default_fallback_status")]
    pub status: u16,

    /// Content-Type header value.
    #[serde(default = "default_fallback_content_type")]
    pub content_type: String,

    /// Response body, served verbatim.
    pub body: String,
}

fn default_fallback_status() -> u16 {
    503
}

fn default_fallback_content_type() -> String {
    "text/plain; charset=utf-8".to_string()
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log filter directive (overridden by RUST_LOG).
    pub log_level: String,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "api_gateway=info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
