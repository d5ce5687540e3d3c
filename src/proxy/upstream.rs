//! Upstream HTTP client and request forwarding.
//!
//! # Responsibilities
//! - Hold the shared pooled client for all upstream calls
//! - Rewrite the request URI onto the route's upstream authority
//! - Apply forwarding header hygiene
//! - Enforce the route's response deadline
//!
//! # Design Decisions
//! - One pooled client shared across routes; per-route state lives in
//!   the limiter and breaker, not the connection pool
//! - The deadline covers time to response head; the body then streams
//!   through without buffering
//! - Hop-by-hop headers are stripped; Host is rewritten to the upstream
//!   authority; X-Forwarded-For preserves the client identity
//! - Timeout and transport errors are the only failure outcomes; any
//!   HTTP response from the upstream, whatever its status, is a success

use std::net::IpAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::uri::PathAndQuery;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Request, Response, Uri};
use hyper::body::Incoming;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use thiserror::Error;

use crate::config::schema::TimeoutConfig;
use crate::routing::Route;

/// Why a forwarded call produced no upstream response.
///
/// Both variants are recorded as breaker failures and served via the
/// route's fallback (or 502).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("upstream did not respond within {0:?}")]
    Timeout(Duration),

    #[error("upstream unavailable: {0}")]
    Unavailable(String),
}

/// Shared HTTP client for upstream calls.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(timeouts.idle_secs))
            .build(connector);

        Self { client }
    }

    /// Forward a request to the route's upstream under its deadline.
    ///
    /// On timeout the in-flight call is dropped (cancelled) and any
    /// partial response discarded.
    pub async fn forward(
        &self,
        route: &Route,
        request: Request<Body>,
        client_ip: IpAddr,
    ) -> Result<Response<Body>, UpstreamError> {
        let (mut parts, body) = request.into_parts();

        let mut uri_parts = parts.uri.into_parts();
        uri_parts.scheme = Some(route.upstream_scheme.clone());
        uri_parts.authority = Some(route.upstream_authority.clone());
        if uri_parts.path_and_query.is_none() {
            uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
        }
        parts.uri = Uri::from_parts(uri_parts)
            .map_err(|e| UpstreamError::Unavailable(format!("invalid forwarded URI: {e}")))?;

        prepare_forward_headers(&mut parts.headers, route, client_ip);

        let request = Request::from_parts(parts, body);
        match tokio::time::timeout(route.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                // Stream the body through; the deadline covered the head.
                let (parts, body): (_, Incoming) = response.into_parts();
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => Err(UpstreamError::Unavailable(e.to_string())),
            Err(_) => Err(UpstreamError::Timeout(route.timeout)),
        }
    }
}

/// Header names that are hop-by-hop per RFC 9110 and must not be
/// forwarded.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

fn prepare_forward_headers(headers: &mut HeaderMap, route: &Route, client_ip: IpAddr) {
    // Headers the client nominated as connection-scoped go first, then
    // the fixed hop-by-hop set (which includes Connection itself).
    let nominated: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in nominated {
        headers.remove(&name);
    }
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }

    if let Ok(host) = HeaderValue::from_str(route.upstream_authority.as_str()) {
        headers.insert(header::HOST, host);
    }

    let forwarded_for = match headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        Some(existing) => format!("{existing}, {client_ip}"),
        None => client_ip.to_string(),
    };
    if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
        headers.insert("x-forwarded-for", value);
    }
}
