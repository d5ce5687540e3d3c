//! Standalone API gateway with per-key rate limiting and per-route
//! circuit breaking.
//!
//! # Architecture Overview
//!
//! ```text
//! inbound request
//!     → routing    (ordered predicate table, first match wins)
//!     → security   (key resolution, token-bucket admission)
//!     → resilience (per-route circuit breaker)
//!     → proxy      (forward to upstream under the route's deadline)
//!     → outcome recorded; response, fallback body, or error status
//!
//! Cross-cutting: config (TOML + hot reload), http (server + middleware),
//! net (bounded listener), observability (tracing + metrics), lifecycle
//! (startup/signals/shutdown).
//! ```

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Traffic management
pub mod fallback;
pub mod proxy;
pub mod resilience;
pub mod security;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use proxy::ProxyEngine;
