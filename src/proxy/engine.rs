//! Request orchestration: the gateway's hot path.
//!
//! # Responsibilities
//! - Drive one request through match → key → limiter → breaker → forward
//! - Record exactly one bucket update and (for forwarded calls) one
//!   breaker outcome per request
//! - Map denials and upstream failures to their HTTP responses
//!
//! # Design Decisions
//! - One ProxyEngine per config generation; a reload builds a new engine
//!   and swaps it atomically, so limiter and breaker state restarts with
//!   the table it belongs to
//! - Denials never surface as errors: they are ordinary responses
//! - A 404 touches no limiter or breaker state at all

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::fallback::FallbackRegistry;
use crate::http::response;
use crate::observability::metrics;
use crate::proxy::upstream::UpstreamClient;
use crate::resilience::CircuitBreaker;
use crate::routing::{Route, RouteBuildError, RouteTable};
use crate::security::key_resolver::StrategyParseError;
use crate::security::{KeyResolver, RateDecision, RateLimiter};

/// Error compiling a validated config into an engine generation.
///
/// Validation runs first, so these indicate an unvalidated config
/// reached the build step.
#[derive(Debug, Error)]
pub enum EngineBuildError {
    #[error(transparent)]
    Route(#[from] RouteBuildError),

    #[error("invalid key resolver strategy: {0}")]
    Resolver(#[from] StrategyParseError),
}

/// One generation of the gateway: routes, policies, and their state.
pub struct ProxyEngine {
    table: RouteTable,
    resolver: KeyResolver,
    limiter: RateLimiter,
    breakers: CircuitBreaker,
    fallbacks: FallbackRegistry,
    client: UpstreamClient,
}

impl ProxyEngine {
    /// Compile a validated config into a fresh engine generation.
    pub fn from_config(config: &GatewayConfig) -> Result<Self, EngineBuildError> {
        let table = RouteTable::from_config(&config.routes)?;
        let breakers = CircuitBreaker::from_table(&table);
        Ok(Self {
            resolver: KeyResolver::from_config(&config.resolver)?,
            limiter: RateLimiter::new(),
            fallbacks: FallbackRegistry::from_config(&config.fallbacks, &config.routes),
            client: UpstreamClient::new(&config.timeouts),
            breakers,
            table,
        })
    }

    /// Handle one inbound request end to end.
    pub async fn handle(&self, request: Request<Body>, peer: SocketAddr) -> Response<Body> {
        let start = Instant::now();
        let method = request.method().to_string();
        let request_id = request
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        // 1. Match. No route means 404 and no state is touched.
        let Some(route) = self.table.match_request(&request) else {
            tracing::warn!(
                request_id = %request_id,
                method = %method,
                path = %request.uri().path(),
                "No route matched"
            );
            metrics::record_request(&method, 404, "none", start);
            return response::not_found();
        };

        // 2. Resolve the rate-limit partition key.
        let key = self.resolver.resolve(request.headers(), peer);

        // 3. Rate limit.
        if let RateDecision::Denied { retry_after } = self.limiter.try_acquire(&route, &key) {
            metrics::record_request(&method, 429, &route.id, start);
            return response::too_many_requests(retry_after);
        }

        // 4. Circuit breaker.
        if !self.breakers.allow(&route).is_allowed() {
            tracing::debug!(
                request_id = %request_id,
                route = %route.id,
                "Breaker open, serving fallback"
            );
            let resp = self.fallback_or_502(&route);
            metrics::record_request(&method, resp.status().as_u16(), &route.id, start);
            return resp;
        }

        // 5. Forward. Any HTTP response is a success outcome; timeout or
        // transport failure is a failure outcome served via fallback.
        match self.client.forward(&route, request, peer.ip()).await {
            Ok(resp) => {
                self.breakers.record_outcome(&route, true);
                metrics::record_request(&method, resp.status().as_u16(), &route.id, start);
                resp
            }
            Err(e) => {
                self.breakers.record_outcome(&route, false);
                tracing::error!(
                    request_id = %request_id,
                    route = %route.id,
                    error = %e,
                    "Upstream call failed"
                );
                let resp = self.fallback_or_502(&route);
                metrics::record_request(&method, resp.status().as_u16(), &route.id, start);
                resp
            }
        }
    }

    fn fallback_or_502(&self, route: &Route) -> Response<Body> {
        match route
            .fallback_id
            .as_deref()
            .and_then(|id| self.fallbacks.lookup(id))
        {
            Some(fallback) => {
                metrics::record_fallback_served(&route.id);
                response::fallback(&fallback)
            }
            None => response::bad_gateway(),
        }
    }

    /// Rate limiter for this generation (background eviction sweeps).
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Route table for this generation.
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Breaker registry for this generation.
    pub fn breakers(&self) -> &CircuitBreaker {
        &self.breakers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RouteConfig;

    fn engine_with_routes(routes: Vec<RouteConfig>) -> ProxyEngine {
        let config = GatewayConfig {
            routes,
            ..Default::default()
        };
        ProxyEngine::from_config(&config).unwrap()
    }

    fn route_config(id: &str, prefix: &str) -> RouteConfig {
        RouteConfig {
            id: id.to_string(),
            methods: None,
            path_prefix: Some(prefix.to_string()),
            host: None,
            upstream: "http://127.0.0.1:1".to_string(),
            timeout_ms: 1_000,
            rate_limit: Default::default(),
            circuit_breaker: Default::default(),
            fallback_id: None,
        }
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    #[tokio::test]
    async fn unknown_path_is_404_and_creates_no_state() {
        let engine = engine_with_routes(vec![route_config("api", "/api")]);
        let request = Request::builder()
            .uri("http://gw.local/unknown")
            .body(Body::default())
            .unwrap();

        let resp = engine.handle(request, peer()).await;
        assert_eq!(resp.status(), 404);
        assert_eq!(engine.limiter().bucket_count(), 0);
    }

    #[tokio::test]
    async fn rate_limited_request_gets_429_with_retry_after() {
        let mut route = route_config("api", "/api");
        route.rate_limit.capacity = 1;
        route.rate_limit.refill_per_sec = 0.001;
        let engine = engine_with_routes(vec![route]);

        // First request passes the limiter (then fails upstream, which is
        // fine for this test); second is throttled before forwarding.
        let req = || {
            Request::builder()
                .uri("http://gw.local/api")
                .body(Body::default())
                .unwrap()
        };
        let _ = engine.handle(req(), peer()).await;
        let resp = engine.handle(req(), peer()).await;

        assert_eq!(resp.status(), 429);
        assert!(resp.headers().get("retry-after").is_some());
    }

    #[tokio::test]
    async fn unreachable_upstream_without_fallback_is_502() {
        let engine = engine_with_routes(vec![route_config("api", "/api")]);
        let request = Request::builder()
            .uri("http://gw.local/api")
            .body(Body::default())
            .unwrap();

        let resp = engine.handle(request, peer()).await;
        assert_eq!(resp.status(), 502);
    }

    #[tokio::test]
    async fn unreachable_upstream_failures_trip_the_breaker() {
        let mut route = route_config("api", "/api");
        route.circuit_breaker.minimum_calls = 3;
        route.circuit_breaker.sliding_window = 10;
        route.circuit_breaker.failure_rate_threshold = 0.5;
        let engine = engine_with_routes(vec![route]);

        let req = || {
            Request::builder()
                .uri("http://gw.local/api")
                .body(Body::default())
                .unwrap()
        };
        for _ in 0..3 {
            let resp = engine.handle(req(), peer()).await;
            assert_eq!(resp.status(), 502);
        }
        assert_eq!(
            engine.breakers().get("api").unwrap().state(),
            crate::resilience::BreakerStateKind::Open
        );
    }
}
