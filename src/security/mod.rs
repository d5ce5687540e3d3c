//! Admission control: who a request counts as, and whether it gets in.
//!
//! # Responsibilities
//! - Resolve the rate-limit partition key for each request
//! - Enforce per-(route, key) token-bucket limits
//!
//! # Design Decisions
//! - Key resolution and limiting are separate concerns: the resolver
//!   decides identity, the limiter decides admission
//! - Both run in bounded time with no I/O; the request path never
//!   blocks here

pub mod key_resolver;
pub mod rate_limit;

pub use key_resolver::{KeyResolver, KeyStrategy};
pub use rate_limit::{RateDecision, RateLimiter};
