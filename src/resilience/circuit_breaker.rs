//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: limited probes test whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate >= threshold over >= minimum_calls outcomes
//! Open → Half-Open: open_duration elapsed (lazily, on the next allow)
//! Half-Open → Closed: every probe in the trial budget succeeded
//! Half-Open → Open: any single probe failed
//! Half-Open (re-arm): budget exhausted with no verdict for open_duration
//! ```
//!
//! # Design Decisions
//! - Per-route breaker (not global); routes never contend on one lock
//! - Explicit tagged state enum, so transition logic is auditable and
//!   testable without I/O
//! - Fail fast in Open state: denied before the upstream is contacted
//! - Outcomes arriving while Open (calls admitted before the trip) are
//!   discarded; the window stays frozen until the breaker closes again
//! - The window is cleared only on Half-Open → Closed, so one threshold
//!   crossing produces exactly one Open transition
//! - A probe whose outcome never arrives (handler cancelled, client gone)
//!   cannot wedge the breaker: once the budget sits exhausted without a
//!   verdict for open_duration, it re-arms and probing starts over

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::schema::BreakerConfig;
use crate::observability::metrics;
use crate::routing::{Route, RouteTable};

/// Outcome of a breaker admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerDecision {
    Allowed,
    Denied,
}

impl BreakerDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, BreakerDecision::Allowed)
    }
}

/// Observable breaker state, for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerStateKind {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerStateKind {
    fn as_str(&self) -> &'static str {
        match self {
            BreakerStateKind::Closed => "closed",
            BreakerStateKind::Open => "open",
            BreakerStateKind::HalfOpen => "half_open",
        }
    }
}

/// Ring buffer of recent call outcomes with a running failure count.
#[derive(Debug)]
struct OutcomeWindow {
    slots: Box<[bool]>,
    next: usize,
    len: usize,
    failures: usize,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            slots: vec![false; capacity.max(1)].into_boxed_slice(),
            next: 0,
            len: 0,
            failures: 0,
        }
    }

    fn push(&mut self, success: bool) {
        if self.len == self.slots.len() {
            // Overwrite the oldest slot; keep the failure count in step.
            if !self.slots[self.next] {
                self.failures -= 1;
            }
        } else {
            self.len += 1;
        }
        self.slots[self.next] = success;
        if !success {
            self.failures += 1;
        }
        self.next = (self.next + 1) % self.slots.len();
    }

    fn clear(&mut self) {
        self.next = 0;
        self.len = 0;
        self.failures = 0;
    }

    fn len(&self) -> usize {
        self.len
    }

    fn failure_rate(&self) -> f64 {
        if self.len == 0 {
            0.0
        } else {
            self.failures as f64 / self.len as f64
        }
    }
}

#[derive(Debug)]
enum State {
    Closed,
    Open {
        opened_at: Instant,
    },
    HalfOpen {
        entered_at: Instant,
        trials_started: usize,
        successes: usize,
    },
}

#[derive(Debug)]
struct Inner {
    state: State,
    window: OutcomeWindow,
}

/// The state machine for a single route.
#[derive(Debug)]
pub struct RouteBreaker {
    route_id: String,
    policy: BreakerConfig,
    inner: Mutex<Inner>,
}

impl RouteBreaker {
    pub fn new(route_id: impl Into<String>, policy: BreakerConfig) -> Self {
        Self {
            route_id: route_id.into(),
            policy,
            inner: Mutex::new(Inner {
                state: State::Closed,
                window: OutcomeWindow::new(policy.sliding_window),
            }),
        }
    }

    /// May a request proceed to the upstream right now?
    pub fn allow(&self) -> BreakerDecision {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> BreakerDecision {
        let open_duration = Duration::from_millis(self.policy.open_duration_ms);
        let mut inner = self.lock();
        match inner.state {
            State::Closed => BreakerDecision::Allowed,
            State::Open { opened_at } => {
                if now.saturating_duration_since(opened_at) >= open_duration {
                    // First probe rides along with the transition.
                    self.transition(&mut inner, State::HalfOpen {
                        entered_at: now,
                        trials_started: 1,
                        successes: 0,
                    });
                    BreakerDecision::Allowed
                } else {
                    metrics::record_breaker_rejected(&self.route_id);
                    BreakerDecision::Denied
                }
            }
            State::HalfOpen {
                ref mut entered_at,
                ref mut trials_started,
                ref mut successes,
            } => {
                if *trials_started < self.policy.half_open_trials {
                    *trials_started += 1;
                    BreakerDecision::Allowed
                } else if now.saturating_duration_since(*entered_at) >= open_duration {
                    // Every probe went unanswered for a full open period;
                    // re-arm the budget so the breaker cannot stay wedged.
                    tracing::info!(
                        route = %self.route_id,
                        "Half-open probes lost, re-arming the trial budget"
                    );
                    *entered_at = now;
                    *trials_started = 1;
                    *successes = 0;
                    BreakerDecision::Allowed
                } else {
                    metrics::record_breaker_rejected(&self.route_id);
                    BreakerDecision::Denied
                }
            }
        }
    }

    /// Record the outcome of a forwarded call.
    pub fn record_outcome(&self, success: bool) {
        self.record_outcome_at(success, Instant::now());
    }

    fn record_outcome_at(&self, success: bool, now: Instant) {
        let mut inner = self.lock();
        match inner.state {
            State::Closed => {
                inner.window.push(success);
                if inner.window.len() >= self.policy.minimum_calls
                    && inner.window.failure_rate() >= self.policy.failure_rate_threshold
                {
                    self.transition(&mut inner, State::Open { opened_at: now });
                }
            }
            // Stragglers from calls admitted before the trip; the window
            // stays frozen until the breaker closes again.
            State::Open { .. } => {}
            State::HalfOpen { successes, .. } => {
                if !success {
                    self.transition(&mut inner, State::Open { opened_at: now });
                } else {
                    let successes = successes + 1;
                    if successes >= self.policy.half_open_trials {
                        inner.window.clear();
                        self.transition(&mut inner, State::Closed);
                    } else if let State::HalfOpen {
                        successes: ref mut s,
                        ..
                    } = inner.state
                    {
                        *s = successes;
                    }
                }
            }
        }
    }

    /// Current state, for logs and tests.
    pub fn state(&self) -> BreakerStateKind {
        match self.lock().state {
            State::Closed => BreakerStateKind::Closed,
            State::Open { .. } => BreakerStateKind::Open,
            State::HalfOpen { .. } => BreakerStateKind::HalfOpen,
        }
    }

    fn transition(&self, inner: &mut Inner, to: State) {
        let from_kind = kind_of(&inner.state);
        let to_kind = kind_of(&to);
        inner.state = to;
        tracing::info!(
            route = %self.route_id,
            from = from_kind.as_str(),
            to = to_kind.as_str(),
            "Circuit breaker transition"
        );
        metrics::record_breaker_transition(&self.route_id, to_kind.as_str());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-transition; the state itself
        // is still coherent (every mutation is a single assignment).
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn kind_of(state: &State) -> BreakerStateKind {
    match state {
        State::Closed => BreakerStateKind::Closed,
        State::Open { .. } => BreakerStateKind::Open,
        State::HalfOpen { .. } => BreakerStateKind::HalfOpen,
    }
}

/// Per-route breaker registry for one engine generation.
///
/// Built once from the route table and immutable afterwards; breaker
/// lifecycle is bound to its table entry, so a reload starts fresh.
#[derive(Debug, Default)]
pub struct CircuitBreaker {
    breakers: HashMap<String, RouteBreaker>,
}

impl CircuitBreaker {
    pub fn from_table(table: &RouteTable) -> Self {
        let breakers = table
            .routes()
            .iter()
            .map(|route| {
                (
                    route.id.clone(),
                    RouteBreaker::new(route.id.clone(), route.circuit_breaker),
                )
            })
            .collect();
        Self { breakers }
    }

    /// May a request for this route proceed?
    pub fn allow(&self, route: &Route) -> BreakerDecision {
        match self.breakers.get(&route.id) {
            Some(breaker) => breaker.allow(),
            // Unreachable when the registry and table share a generation.
            None => BreakerDecision::Allowed,
        }
    }

    /// Record a forwarded call's outcome for this route.
    pub fn record_outcome(&self, route: &Route, success: bool) {
        if let Some(breaker) = self.breakers.get(&route.id) {
            breaker.record_outcome(success);
        }
    }

    /// Breaker for a specific route id, if registered.
    pub fn get(&self, route_id: &str) -> Option<&RouteBreaker> {
        self.breakers.get(route_id)
    }
}
