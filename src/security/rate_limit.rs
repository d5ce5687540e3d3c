//! Token-bucket rate limiting, partitioned per (route, key).
//!
//! # Responsibilities
//! - Admit or deny requests per resolved partition key
//! - Refill buckets continuously from elapsed wall time
//! - Evict buckets idle long enough to be back at capacity anyway
//!
//! # Design Decisions
//! - Refill and decrement happen in one critical section under the
//!   bucket's own mutex, so concurrent requests on the same key cannot
//!   double-spend a token
//! - The bucket map is sharded (DashMap); unrelated keys never contend
//! - Buckets start full: a new key gets its full burst allowance
//! - Denials are values, not errors; the denial carries a Retry-After hint

use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::schema::LimiterConfig;
use crate::observability::metrics;
use crate::routing::Route;

/// How many full-refill periods a bucket may sit idle before eviction.
/// An idle bucket is back at capacity after one period, so removing it
/// at ten changes nothing observable.
const IDLE_EVICTION_FACTOR: f64 = 10.0;

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allowed,
    /// Denied, with the time until one token will have accrued.
    Denied { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateDecision::Allowed)
    }
}

/// A single token bucket. Mutated only under its entry's mutex.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    fn try_acquire(&mut self, policy: &LimiterConfig, now: Instant) -> RateDecision {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens =
            (self.tokens + elapsed * policy.refill_per_sec).min(f64::from(policy.capacity));
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            RateDecision::Allowed
        } else {
            let deficit = 1.0 - self.tokens;
            RateDecision::Denied {
                retry_after: Duration::from_secs_f64(deficit / policy.refill_per_sec),
            }
        }
    }
}

/// A bucket plus the idle threshold derived from its route's policy.
#[derive(Debug)]
struct BucketEntry {
    idle_after: Duration,
    bucket: Mutex<TokenBucket>,
}

#[derive(Debug, Hash, PartialEq, Eq)]
struct BucketKey {
    route: String,
    key: String,
}

/// Per-(route, key) token-bucket admission control.
#[derive(Debug, Default)]
pub struct RateLimiter {
    buckets: DashMap<BucketKey, BucketEntry>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            buckets: DashMap::new(),
        }
    }

    /// Admit or deny one request for `key` on `route`.
    ///
    /// Creates the bucket on first sight, full. Denied requests consume
    /// nothing.
    pub fn try_acquire(&self, route: &Route, key: &str) -> RateDecision {
        self.try_acquire_at(route, key, Instant::now())
    }

    fn try_acquire_at(&self, route: &Route, key: &str, now: Instant) -> RateDecision {
        let policy = &route.rate_limit;
        let entry = self
            .buckets
            .entry(BucketKey {
                route: route.id.clone(),
                key: key.to_string(),
            })
            .or_insert_with(|| BucketEntry {
                idle_after: idle_threshold(policy),
                bucket: Mutex::new(TokenBucket::new(policy.capacity, now)),
            });

        // Short critical section: arithmetic only, no I/O.
        let decision = match entry.bucket.lock() {
            Ok(mut bucket) => bucket.try_acquire(policy, now),
            // A poisoned bucket means a panic mid-arithmetic; failing open
            // for one request beats wedging the partition.
            Err(poisoned) => poisoned.into_inner().try_acquire(policy, now),
        };

        if let RateDecision::Denied { .. } = decision {
            metrics::record_rate_limited(&route.id, key);
        }
        decision
    }

    /// Drop buckets idle longer than ten full-refill periods.
    ///
    /// Called periodically from a background sweeper; an evicted bucket
    /// would be recreated full, and any bucket idle that long is already
    /// back at capacity, so removal is not observable to clients.
    pub fn evict_idle(&self) {
        self.evict_idle_at(Instant::now());
    }

    fn evict_idle_at(&self, now: Instant) {
        self.buckets.retain(|_, entry| match entry.bucket.lock() {
            Ok(bucket) => now.saturating_duration_since(bucket.last_refill) < entry.idle_after,
            Err(_) => false,
        });
        metrics::set_live_buckets(self.buckets.len());
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

fn idle_threshold(policy: &LimiterConfig) -> Duration {
    let full_refill_secs = f64::from(policy.capacity) / policy.refill_per_sec;
    Duration::from_secs_f64(full_refill_secs * IDLE_EVICTION_FACTOR)
}
