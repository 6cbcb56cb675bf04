//! Circuit breaker for provider-bound calls.
//!
//! State machine: closed (failures counted in a sliding window) → open
//! (calls short-circuit with [`CircuitOpenError`]) once the window hits
//! the threshold → half-open after the reset timeout, letting exactly
//! one probe through. The orchestrator keeps one breaker per provider
//! so a failing provider cannot block dispatch to healthy ones.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::errors::{CircuitOpenError, RailyardError};

/// The breaker's current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through; failures are counted.
    Closed,
    /// Calls short-circuit immediately.
    Open,
    /// One probe call is allowed through.
    HalfOpen,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A circuit breaker guarding one logical scope (a provider).
#[derive(Debug)]
pub struct CircuitBreaker {
    scope: String,
    threshold: u32,
    window: Duration,
    reset_timeout: Duration,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker for the given scope.
    #[must_use]
    pub fn new(
        scope: impl Into<String>,
        threshold: u32,
        window: Duration,
        reset_timeout: Duration,
    ) -> Self {
        Self {
            scope: scope.into(),
            threshold: threshold.max(1),
            window,
            reset_timeout,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
            }),
        }
    }

    /// Returns the current state, advancing open → half-open when the
    /// reset timeout has elapsed.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);
        inner.state
    }

    /// Wraps a provider-bound call.
    ///
    /// When the circuit is open the inner future is never polled; the
    /// call fails fast with [`CircuitOpenError`].
    pub async fn call<T, F>(&self, fut: F) -> Result<T, RailyardError>
    where
        F: Future<Output = Result<T, RailyardError>>,
    {
        self.before_call()?;

        match fut.await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure();
                Err(err)
            }
        }
    }

    fn before_call(&self) -> Result<(), RailyardError> {
        let mut inner = self.inner.lock();
        self.advance(&mut inner);

        match inner.state {
            CircuitState::Closed => Ok(()),
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(CircuitOpenError::new(&self.scope, self.retry_after_ms(&inner)).into())
                } else {
                    inner.probe_in_flight = true;
                    debug!(scope = %self.scope, "circuit half-open, allowing probe");
                    Ok(())
                }
            }
            CircuitState::Open => {
                Err(CircuitOpenError::new(&self.scope, self.retry_after_ms(&inner)).into())
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            debug!(scope = %self.scope, "probe succeeded, closing circuit");
        }
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.opened_at = None;
        inner.probe_in_flight = false;
    }

    fn record_failure(&self) {
        let mut inner = self.inner.lock();
        let now = Instant::now();

        if inner.state == CircuitState::HalfOpen {
            warn!(scope = %self.scope, "probe failed, reopening circuit");
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.probe_in_flight = false;
            return;
        }

        inner.failures.push_back(now);
        while let Some(front) = inner.failures.front() {
            if now.duration_since(*front) > self.window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }

        if inner.failures.len() as u32 >= self.threshold {
            warn!(
                scope = %self.scope,
                failures = inner.failures.len(),
                "failure threshold reached, opening circuit"
            );
            inner.state = CircuitState::Open;
            inner.opened_at = Some(now);
            inner.failures.clear();
        }
    }

    fn advance(&self, inner: &mut BreakerInner) {
        if inner.state == CircuitState::Open {
            if let Some(opened_at) = inner.opened_at {
                if opened_at.elapsed() >= self.reset_timeout {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = false;
                }
            }
        }
    }

    fn retry_after_ms(&self, inner: &BreakerInner) -> u64 {
        inner
            .opened_at
            .map(|at| {
                self.reset_timeout
                    .saturating_sub(at.elapsed())
                    .as_millis()
                    .min(u128::from(u64::MAX)) as u64
            })
            .unwrap_or(0)
    }
}
