//! Upstream failure protection.
//!
//! # Responsibilities
//! - Track call outcomes per route in a sliding window
//! - Fail fast when a route's upstream is deemed down
//! - Probe for recovery and reclose gradually
//!
//! # Design Decisions
//! - One breaker per route, each under its own lock; routes never
//!   serialize against each other
//! - Denials are decisions, not errors; the proxy maps them to fallbacks

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerDecision, BreakerStateKind, CircuitBreaker, RouteBreaker};
