//! Configuration validation.
//!
//! Serde handles the syntactic layer; this module makes the semantic
//! checks: value ranges, referential integrity, and anything that would
//! let an invalid table reach the proxy engine. Validation is a pure
//! function and reports every violation it finds, not just the first.

use axum::http::Method;
use thiserror::Error;
use url::Url;

use crate::config::schema::{GatewayConfig, RouteConfig};
use crate::security::key_resolver::KeyStrategy;

/// A single semantic violation in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener bind address {0:?} is not a valid socket address")]
    InvalidBindAddress(String),

    #[error("listener max_connections must be at least 1")]
    ZeroMaxConnections,

    #[error("key resolver strategy {strategy:?} is invalid: {reason}")]
    InvalidKeyStrategy { strategy: String, reason: String },

    #[error("route id may not be empty")]
    EmptyRouteId,

    #[error("duplicate route id {0:?}")]
    DuplicateRouteId(String),

    #[error("route {route}: upstream {upstream:?} is invalid: {reason}")]
    InvalidUpstream {
        route: String,
        upstream: String,
        reason: String,
    },

    #[error("route {route}: method {method:?} is not a valid HTTP method")]
    InvalidMethod { route: String, method: String },

    #[error("route {route}: timeout_ms must be at least 1")]
    ZeroTimeout { route: String },

    #[error(
        "route {route}: timeout_ms {timeout_ms} exceeds the request ceiling \
         of {request_secs}s (timeouts.request_secs)"
    )]
    TimeoutExceedsCeiling {
        route: String,
        timeout_ms: u64,
        request_secs: u64,
    },

    #[error("route {route}: rate limit capacity must be at least 1")]
    ZeroCapacity { route: String },

    #[error("route {route}: rate limit refill_per_sec must be positive and finite")]
    InvalidRefillRate { route: String },

    #[error("route {route}: failure_rate_threshold must be in (0, 1]")]
    InvalidFailureThreshold { route: String },

    #[error("route {route}: sliding_window must be at least 1")]
    ZeroSlidingWindow { route: String },

    #[error("route {route}: minimum_calls must be at least 1 and at most sliding_window")]
    InvalidMinimumCalls { route: String },

    #[error("route {route}: open_duration_ms must be at least 1")]
    ZeroOpenDuration { route: String },

    #[error("route {route}: half_open_trials must be at least 1")]
    ZeroHalfOpenTrials { route: String },

    #[error("duplicate fallback id {0:?}")]
    DuplicateFallbackId(String),

    #[error("fallback {id}: status {status} is not a valid HTTP status code")]
    InvalidFallbackStatus { id: String, status: u16 },
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if let Err(reason) = KeyStrategy::parse(&config.resolver.strategy) {
        errors.push(ValidationError::InvalidKeyStrategy {
            strategy: config.resolver.strategy.clone(),
            reason: reason.to_string(),
        });
    }

    let mut seen_routes = std::collections::HashSet::new();
    for route in &config.routes {
        if route.id.is_empty() {
            errors.push(ValidationError::EmptyRouteId);
        } else if !seen_routes.insert(route.id.as_str()) {
            errors.push(ValidationError::DuplicateRouteId(route.id.clone()));
        }
        validate_route(route, config.timeouts.request_secs, &mut errors);
    }

    let mut seen_fallbacks = std::collections::HashSet::new();
    for fallback in &config.fallbacks {
        if !seen_fallbacks.insert(fallback.id.as_str()) {
            errors.push(ValidationError::DuplicateFallbackId(fallback.id.clone()));
        }
        if !(100..=599).contains(&fallback.status) {
            errors.push(ValidationError::InvalidFallbackStatus {
                id: fallback.id.clone(),
                status: fallback.status,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_route(route: &RouteConfig, request_secs: u64, errors: &mut Vec<ValidationError>) {
    match Url::parse(&route.upstream) {
        Ok(url) => {
            if !matches!(url.scheme(), "http" | "https") {
                errors.push(invalid_upstream(route, "scheme must be http or https"));
            }
            if url.host_str().is_none() {
                errors.push(invalid_upstream(route, "missing host"));
            }
            if !matches!(url.path(), "" | "/") || url.query().is_some() {
                // Forwarding preserves the inbound path verbatim; a base
                // path on the upstream URL would be dropped silently.
                errors.push(invalid_upstream(route, "must not carry a path or query"));
            }
            if !url.username().is_empty() || url.password().is_some() {
                errors.push(invalid_upstream(route, "must not carry credentials"));
            }
        }
        Err(e) => errors.push(invalid_upstream(route, &e.to_string())),
    }

    if let Some(methods) = &route.methods {
        for method in methods {
            if Method::from_bytes(method.as_bytes()).is_err() {
                errors.push(ValidationError::InvalidMethod {
                    route: route.id.clone(),
                    method: method.clone(),
                });
            }
        }
    }

    if route.timeout_ms == 0 {
        errors.push(ValidationError::ZeroTimeout {
            route: route.id.clone(),
        });
    } else if route.timeout_ms > request_secs.saturating_mul(1000) {
        errors.push(ValidationError::TimeoutExceedsCeiling {
            route: route.id.clone(),
            timeout_ms: route.timeout_ms,
            request_secs,
        });
    }

    let limiter = &route.rate_limit;
    if limiter.capacity == 0 {
        errors.push(ValidationError::ZeroCapacity {
            route: route.id.clone(),
        });
    }
    if !(limiter.refill_per_sec.is_finite() && limiter.refill_per_sec > 0.0) {
        errors.push(ValidationError::InvalidRefillRate {
            route: route.id.clone(),
        });
    }

    let breaker = &route.circuit_breaker;
    if !(breaker.failure_rate_threshold > 0.0 && breaker.failure_rate_threshold <= 1.0) {
        errors.push(ValidationError::InvalidFailureThreshold {
            route: route.id.clone(),
        });
    }
    if breaker.sliding_window == 0 {
        errors.push(ValidationError::ZeroSlidingWindow {
            route: route.id.clone(),
        });
    }
    if breaker.minimum_calls == 0 || breaker.minimum_calls > breaker.sliding_window {
        errors.push(ValidationError::InvalidMinimumCalls {
            route: route.id.clone(),
        });
    }
    if breaker.open_duration_ms == 0 {
        errors.push(ValidationError::ZeroOpenDuration {
            route: route.id.clone(),
        });
    }
    if breaker.half_open_trials == 0 {
        errors.push(ValidationError::ZeroHalfOpenTrials {
            route: route.id.clone(),
        });
    }
}

fn invalid_upstream(route: &RouteConfig, reason: &str) -> ValidationError {
    ValidationError::InvalidUpstream {
        route: route.id.clone(),
        upstream: route.upstream.clone(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{FallbackConfig, LimiterConfig};

    fn route(id: &str, upstream: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            methods: None,
            path_prefix: Some(format!("/{id}")),
            host: None,
            upstream: upstream.to_string(),
            timeout_ms: 5_000,
            rate_limit: LimiterConfig::default(),
            circuit_breaker: Default::default(),
            fallback_id: None,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn accepts_well_formed_routes() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("a", "http://127.0.0.1:9001"));
        config.routes.push(route("b", "https://svc.internal:9002"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_duplicate_route_ids() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("a", "http://127.0.0.1:9001"));
        config.routes.push(route("a", "http://127.0.0.1:9002"));
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateRouteId(id) if id == "a")));
    }

    #[test]
    fn rejects_upstream_with_path_or_bad_scheme() {
        let mut config = GatewayConfig::default();
        config.routes.push(route("a", "http://127.0.0.1:9001/api"));
        config.routes.push(route("b", "ftp://127.0.0.1:9001"));
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors
                .iter()
                .filter(|e| matches!(e, ValidationError::InvalidUpstream { .. }))
                .count(),
            2
        );
    }

    #[test]
    fn rejects_invalid_policies_and_collects_all() {
        let mut config = GatewayConfig::default();
        let mut bad = route("a", "http://127.0.0.1:9001");
        bad.rate_limit.capacity = 0;
        bad.rate_limit.refill_per_sec = 0.0;
        bad.circuit_breaker.failure_rate_threshold = 1.5;
        bad.circuit_breaker.minimum_calls = 50;
        bad.circuit_breaker.sliding_window = 10;
        config.routes.push(bad);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 4, "expected all violations, got {errors:?}");
    }

    #[test]
    fn rejects_route_timeout_above_request_ceiling() {
        let mut config = GatewayConfig::default();
        config.timeouts.request_secs = 2;
        let mut r = route("slow", "http://127.0.0.1:9001");
        r.timeout_ms = 5_000;
        config.routes.push(r);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::TimeoutExceedsCeiling { .. })));
    }

    #[test]
    fn rejects_bad_method_and_strategy() {
        let mut config = GatewayConfig::default();
        config.resolver.strategy = "header".to_string();
        let mut r = route("a", "http://127.0.0.1:9001");
        r.methods = Some(vec!["GET".into(), "FE TCH".into()]);
        config.routes.push(r);
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidKeyStrategy { .. })));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidMethod { .. })));
    }

    #[test]
    fn rejects_duplicate_and_invalid_fallbacks() {
        let mut config = GatewayConfig::default();
        config.fallbacks.push(FallbackConfig {
            id: "down".to_string(),
            status: 503,
            content_type: "text/plain".to_string(),
            body: "down".to_string(),
        });
        config.fallbacks.push(FallbackConfig {
            id: "down".to_string(),
            status: 777,
            content_type: "text/plain".to_string(),
            body: "down".to_string(),
        });
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateFallbackId(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidFallbackStatus { .. })));
    }
}
