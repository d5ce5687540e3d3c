//! Route table: ordered predicate list over compiled routes.
//!
//! # Responsibilities
//! - Compile validated route configs into immutable Route entries
//! - Evaluate predicates in file order (first match wins)
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction; reload builds a whole new table
//! - File order is match priority, no separate priority field
//! - Upstream scheme/authority pre-parsed at build so the hot path
//!   never touches the URL parser

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::{Authority, Scheme};
use axum::http::{Method, Request};
use thiserror::Error;
use url::Url;

use crate::config::schema::{BreakerConfig, LimiterConfig, RouteConfig};
use crate::routing::matcher::{AndMatcher, HostMatcher, Matcher, MethodMatcher, PathPrefixMatcher};

/// Error compiling a route config into a table entry.
///
/// Validation catches these before a config is accepted, so hitting one
/// here means the table was built from an unvalidated config.
#[derive(Debug, Error)]
pub enum RouteBuildError {
    #[error("route {route}: upstream URL {upstream:?} failed to parse: {source}")]
    Upstream {
        route: String,
        upstream: String,
        source: url::ParseError,
    },

    #[error("route {route}: upstream {upstream:?} has no usable authority")]
    Authority { route: String, upstream: String },

    #[error("route {route}: method {method:?} is not a valid HTTP method")]
    Method { route: String, method: String },
}

/// A compiled route: match conditions plus the policy bundle applied to
/// everything that flows through it.
#[derive(Debug)]
pub struct Route {
    /// Unique identifier, used for logging, metrics, and state keying.
    pub id: String,

    /// Upstream base URL as configured.
    pub upstream: Url,

    /// Pre-parsed scheme for the forwarded URI.
    pub upstream_scheme: Scheme,

    /// Pre-parsed authority (host:port) for the forwarded URI.
    pub upstream_authority: Authority,

    /// Per-request upstream response deadline.
    pub timeout: Duration,

    /// Token-bucket policy.
    pub rate_limit: LimiterConfig,

    /// Circuit-breaker policy.
    pub circuit_breaker: BreakerConfig,

    /// Fallback served when the breaker is open or the upstream fails.
    pub fallback_id: Option<String>,

    matcher: AndMatcher,
}

impl Route {
    fn from_config(config: &RouteConfig) -> Result<Self, RouteBuildError> {
        let upstream = Url::parse(&config.upstream).map_err(|source| RouteBuildError::Upstream {
            route: config.id.clone(),
            upstream: config.upstream.clone(),
            source,
        })?;

        let no_authority = || RouteBuildError::Authority {
            route: config.id.clone(),
            upstream: config.upstream.clone(),
        };
        let scheme = Scheme::from_str(upstream.scheme()).map_err(|_| no_authority())?;
        let host = upstream.host_str().ok_or_else(no_authority)?;
        let authority_str = match upstream.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        };
        let authority = Authority::from_str(&authority_str).map_err(|_| no_authority())?;

        let mut matchers: Vec<Box<dyn Matcher>> = Vec::new();
        if let Some(methods) = &config.methods {
            let mut allowed = Vec::with_capacity(methods.len());
            for method in methods {
                allowed.push(Method::from_bytes(method.as_bytes()).map_err(|_| {
                    RouteBuildError::Method {
                        route: config.id.clone(),
                        method: method.clone(),
                    }
                })?);
            }
            matchers.push(Box::new(MethodMatcher::new(allowed)));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Box::new(PathPrefixMatcher::new(prefix.clone())));
        }
        if let Some(host) = &config.host {
            matchers.push(Box::new(HostMatcher::new(host.clone())));
        }

        Ok(Self {
            id: config.id.clone(),
            upstream,
            upstream_scheme: scheme,
            upstream_authority: authority,
            timeout: Duration::from_millis(config.timeout_ms),
            rate_limit: config.rate_limit,
            circuit_breaker: config.circuit_breaker,
            fallback_id: config.fallback_id.clone(),
            matcher: AndMatcher::new(matchers),
        })
    }

    /// Returns true if the request satisfies every configured condition.
    pub fn matches(&self, req: &Request<Body>) -> bool {
        self.matcher.matches(req)
    }
}

/// Immutable ordered collection of compiled routes.
#[derive(Debug)]
pub struct RouteTable {
    routes: Vec<Arc<Route>>,
}

impl RouteTable {
    /// Compile a validated route list, preserving file order.
    pub fn from_config(configs: &[RouteConfig]) -> Result<Self, RouteBuildError> {
        let mut routes = Vec::with_capacity(configs.len());
        for config in configs {
            routes.push(Arc::new(Route::from_config(config)?));
        }
        if routes.is_empty() {
            tracing::warn!("Route table is empty; every request will get 404");
        }
        Ok(Self { routes })
    }

    /// Find the first route whose conditions match the request.
    pub fn match_request(&self, req: &Request<Body>) -> Option<Arc<Route>> {
        self.routes.iter().find(|r| r.matches(req)).cloned()
    }

    /// All routes in match order.
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Number of configured routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// True when no routes are configured.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
