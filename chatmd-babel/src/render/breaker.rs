//! Circuit breaker around risky render work
//!
//! # State Transitions
//!
//! ```text
//! Closed   → Open:     `failure_threshold` consecutive failures
//! Open     → HalfOpen: first call after the cool-down has elapsed
//! HalfOpen → Closed:   that call succeeds (failure counter reset)
//! HalfOpen → Open:     that call fails
//! ```
//!
//! Only one trial call runs while half-open. Other callers are refused as if
//! the circuit were still open until the trial settles.
//!
//! While open inside the cool-down the operation is never invoked. An `Err`
//! or a panic from the operation counts as one failure.
//!
//! The breaker is an ordinary value: construct one, share it through an
//! `Arc`, and hand it to the renderer. State lives behind a `Mutex`, so
//! concurrent renders cannot race on the failure counter.

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_FAILURE_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Why a guarded call did not produce a value
#[derive(Debug, thiserror::Error)]
pub enum BreakerError<E> {
    #[error("circuit is open")]
    Open,
    #[error("operation failed: {0}")]
    Failed(E),
    #[error("operation panicked")]
    Panicked,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    failures: u32,
    last_failure: Option<Instant>,
    trial_in_flight: bool,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    failure_threshold: u32,
    cooldown: Duration,
    inner: Mutex<Inner>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAILURE_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, cooldown: Duration) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            cooldown,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failures: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    pub fn last_failure(&self) -> Option<Instant> {
        self.lock().last_failure
    }

    /// Back to `Closed` with no recorded failures
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.last_failure = None;
        inner.trial_in_flight = false;
    }

    /// Run `operation`, returning `fallback` when the circuit is open or the
    /// operation fails
    pub fn execute<T, E, F>(&self, operation: F, fallback: T) -> T
    where
        F: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        match self.call(operation) {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(error = %e, "Circuit breaker returned fallback");
                fallback
            }
        }
    }

    /// Run `operation` through the breaker, reporting why no value came back
    pub fn call<T, E, F>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if !self.admit() {
            return Err(BreakerError::Open);
        }

        match panic::catch_unwind(AssertUnwindSafe(operation)) {
            Ok(Ok(value)) => {
                self.record_success();
                Ok(value)
            }
            Ok(Err(e)) => {
                self.record_failure();
                Err(BreakerError::Failed(e))
            }
            Err(_) => {
                self.record_failure();
                Err(BreakerError::Panicked)
            }
        }
    }

    /// Whether a call may run now, moving `Open` to `HalfOpen` once the
    /// cool-down has elapsed
    fn admit(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return false;
                }
                inner.trial_in_flight = true;
                true
            }
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .map_or(true, |at| at.elapsed() >= self.cooldown);
                if cooled_down {
                    tracing::info!("Circuit half-open, attempting a trial call");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                }
                cooled_down
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            tracing::info!("Circuit closed after successful trial call");
        }
        inner.state = CircuitState::Closed;
        inner.failures = 0;
        inner.trial_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.lock();
        inner.trial_in_flight = false;
        inner.failures = inner.failures.saturating_add(1);
        inner.last_failure = Some(Instant::now());
        let trip = inner.state == CircuitState::HalfOpen || inner.failures >= self.failure_threshold;
        if trip && inner.state != CircuitState::Open {
            tracing::warn!(failures = inner.failures, "Circuit opened");
            inner.state = CircuitState::Open;
        }
    }
}
