//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure ratio >= threshold over the last N calls (at least M samples)
//! Open → Half-Open: first admission attempt after the cool-down
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-service circuit breaker (not global)
//! - Fail fast in Open state (no waiting for timeout)
//! - Bounded trials in Half-Open (prevents hammering recovering backend)
//! - Every admitted call holds a permit; dropping it unrecorded counts as a failure
//! - Outcomes from calls admitted before the latest transition are ignored

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tokio::sync::broadcast;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "CLOSED",
            BreakerState::Open => "OPEN",
            BreakerState::HalfOpen => "HALF_OPEN",
        }
    }

    /// Numeric value exported on the state gauge.
    pub fn gauge_value(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::Open => 1.0,
            BreakerState::HalfOpen => 2.0,
        }
    }
}

/// Classified result of one upstream call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Success,
    Failure,
}

impl CallOutcome {
    /// 5xx responses count against the backend; everything else does not.
    pub fn from_status(status: u16) -> Self {
        if (500..600).contains(&status) {
            CallOutcome::Failure
        } else {
            CallOutcome::Success
        }
    }
}

/// A state change, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerTransition {
    pub service: String,
    pub from: BreakerState,
    pub to: BreakerState,
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerRejected {
    pub state: BreakerState,
}

/// Point-in-time view for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub service: String,
    pub state: BreakerState,
    pub samples: usize,
    pub failures: usize,
    pub failure_rate: f64,
    pub trials_in_flight: u32,
    /// Milliseconds until a trial is allowed, while Open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_ms: Option<u64>,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    window: VecDeque<CallOutcome>,
    opened_at: Option<Instant>,
    trials_in_flight: u32,
    generation: u64,
}

impl Inner {
    fn failures(&self) -> usize {
        self.window.iter().filter(|o| **o == CallOutcome::Failure).count()
    }

    fn failure_rate(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.failures() as f64 / self.window.len() as f64
        }
    }

    fn transition(&mut self, service: &str, to: BreakerState, now: Instant) -> BreakerTransition {
        let from = self.state;
        self.state = to;
        self.generation += 1;
        self.trials_in_flight = 0;
        match to {
            BreakerState::Open => {
                self.opened_at = Some(now);
                self.window.clear();
            }
            BreakerState::Closed => {
                self.opened_at = None;
                self.window.clear();
            }
            BreakerState::HalfOpen => {}
        }
        BreakerTransition {
            service: service.to_string(),
            from,
            to,
        }
    }
}

/// Circuit breaker guarding one logical service.
#[derive(Debug)]
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    events: Option<broadcast::Sender<BreakerTransition>>,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self::with_events(service, config, None)
    }

    pub(crate) fn with_events(
        service: impl Into<String>,
        config: CircuitBreakerConfig,
        events: Option<broadcast::Sender<BreakerTransition>>,
    ) -> Self {
        let window = VecDeque::with_capacity(config.window_size);
        Self {
            service: service.into(),
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window,
                opened_at: None,
                trials_in_flight: 0,
                generation: 0,
            }),
            events,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Ask for permission to call the backend.
    pub fn try_acquire(self: &Arc<Self>) -> Result<CallPermit, BreakerRejected> {
        self.try_acquire_at(Instant::now())
    }

    pub fn try_acquire_at(self: &Arc<Self>, now: Instant) -> Result<CallPermit, BreakerRejected> {
        let mut transition = None;
        let result = {
            let mut inner = self.lock();
            match inner.state {
                BreakerState::Closed => Ok((inner.generation, false)),
                BreakerState::Open => {
                    let cooled = inner
                        .opened_at
                        .map_or(true, |at| now.saturating_duration_since(at) >= self.config.cool_down());
                    if cooled {
                        transition = Some(inner.transition(&self.service, BreakerState::HalfOpen, now));
                        inner.trials_in_flight = 1;
                        Ok((inner.generation, true))
                    } else {
                        Err(BreakerRejected { state: BreakerState::Open })
                    }
                }
                BreakerState::HalfOpen => {
                    if inner.trials_in_flight < self.config.half_open_max_calls {
                        inner.trials_in_flight += 1;
                        Ok((inner.generation, true))
                    } else {
                        Err(BreakerRejected { state: BreakerState::HalfOpen })
                    }
                }
            }
        };

        if let Some(t) = transition {
            self.publish(t);
        }

        result.map(|(generation, trial)| CallPermit {
            breaker: self.clone(),
            generation,
            trial,
            done: false,
        })
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        self.snapshot_at(Instant::now())
    }

    pub fn snapshot_at(&self, now: Instant) -> BreakerSnapshot {
        let inner = self.lock();
        let retry_in_ms = match (inner.state, inner.opened_at) {
            (BreakerState::Open, Some(at)) => Some(
                self.config
                    .cool_down()
                    .saturating_sub(now.saturating_duration_since(at))
                    .as_millis() as u64,
            ),
            _ => None,
        };
        BreakerSnapshot {
            service: self.service.clone(),
            state: inner.state,
            samples: inner.window.len(),
            failures: inner.failures(),
            failure_rate: inner.failure_rate(),
            trials_in_flight: inner.trials_in_flight,
            retry_in_ms,
        }
    }

    fn on_outcome(&self, generation: u64, trial: bool, outcome: CallOutcome, now: Instant) {
        let transition = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return;
            }
            match inner.state {
                BreakerState::Closed => {
                    inner.window.push_back(outcome);
                    while inner.window.len() > self.config.window_size {
                        inner.window.pop_front();
                    }
                    let tripped = inner.window.len() >= self.config.minimum_calls
                        && inner.failure_rate() >= self.config.failure_rate_threshold;
                    tripped.then(|| inner.transition(&self.service, BreakerState::Open, now))
                }
                BreakerState::HalfOpen if trial => {
                    let to = match outcome {
                        CallOutcome::Success => BreakerState::Closed,
                        CallOutcome::Failure => BreakerState::Open,
                    };
                    Some(inner.transition(&self.service, to, now))
                }
                _ => None,
            }
        };

        if let Some(t) = transition {
            self.publish(t);
        }
    }

    fn on_release(&self, generation: u64, trial: bool) {
        let mut inner = self.lock();
        if trial && inner.generation == generation && inner.state == BreakerState::HalfOpen {
            inner.trials_in_flight = inner.trials_in_flight.saturating_sub(1);
        }
    }

    fn publish(&self, transition: BreakerTransition) {
        match transition.to {
            BreakerState::Open => tracing::warn!(
                service = %self.service,
                from = transition.from.as_str(),
                "Circuit breaker opened"
            ),
            BreakerState::HalfOpen => tracing::info!(service = %self.service, "Circuit breaker half-open, admitting trial"),
            BreakerState::Closed => tracing::info!(service = %self.service, "Circuit breaker closed"),
        }
        metrics::record_breaker_transition(&self.service, transition.to);
        if let Some(events) = &self.events {
            // No subscribers is fine.
            let _ = events.send(transition);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission to call the backend once.
///
/// Consumed by [`record`](Self::record) or [`release`](Self::release).
/// Dropping it unrecorded (for example when the request future is cancelled)
/// counts as a failure.
#[derive(Debug)]
pub struct CallPermit {
    breaker: Arc<CircuitBreaker>,
    generation: u64,
    trial: bool,
    done: bool,
}

impl CallPermit {
    /// Whether this is a Half-Open trial call.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn record(self, outcome: CallOutcome) {
        self.record_at(outcome, Instant::now());
    }

    pub fn record_at(mut self, outcome: CallOutcome, now: Instant) {
        self.done = true;
        self.breaker.on_outcome(self.generation, self.trial, outcome, now);
    }

    /// Give the permit back without an outcome; the call was never sent.
    pub fn release(mut self) {
        self.done = true;
        self.breaker.on_release(self.generation, self.trial);
    }
}

impl Drop for CallPermit {
    fn drop(&mut self) {
        if !self.done {
            tracing::debug!(service = %self.breaker.service, "Call permit dropped unrecorded, counting failure");
            self.breaker
                .on_outcome(self.generation, self.trial, CallOutcome::Failure, Instant::now());
        }
    }
}
