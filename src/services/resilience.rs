// src/services/resilience.rs
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use log::{debug, warn};
use thiserror::Error;
use tokio::sync::Semaphore;

/// Failure-handling policy applied around every backend call.
#[derive(Debug, Clone)]
pub struct ResilienceConfig {
    /// Upper bound on a single backend attempt.
    pub call_timeout: Duration,
    /// Total attempts including the first (1 disables retries).
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent retry.
    pub base_backoff: Duration,
    /// Consecutive failures that trip the breaker open.
    pub failure_threshold: u32,
    /// Cool-down before an open breaker admits a trial call.
    pub open_for: Duration,
    /// Bulkhead: in-flight calls allowed per backend.
    pub max_in_flight: usize,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        ResilienceConfig {
            call_timeout: Duration::from_millis(800),
            max_attempts: 3,
            base_backoff: Duration::from_millis(50),
            failure_threshold: 5,
            open_for: Duration::from_secs(10),
            max_in_flight: 8,
        }
    }
}

/// Errors surfaced by a wrapped backend call. `NotFound` is an authoritative
/// backend answer, never synthesized by the wrapper itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("backend call timed out")]
    Timeout,
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("backend concurrency limit exceeded")]
    CapacityExceeded,
    #[error("account not found")]
    NotFound,
    #[error("backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallKind {
    Normal,
    /// The single probe admitted while half-open. Never retried.
    Trial,
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Instant,
    trial_in_flight: bool,
}

/// Per-backend breaker. All transitions happen under one mutex so a failure
/// count bump and the state flip are a single indivisible step.
pub struct CircuitBreaker {
    inner: Mutex<CircuitInner>,
    failure_threshold: u32,
    open_for: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, open_for: Duration) -> Self {
        CircuitBreaker {
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: Instant::now(),
                trial_in_flight: false,
            }),
            failure_threshold,
            open_for,
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    fn try_acquire(&self) -> Result<CallKind, FetchError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            CircuitState::Closed => Ok(CallKind::Normal),
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.open_for {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(CallKind::Trial)
                } else {
                    Err(FetchError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(FetchError::CircuitOpen)
                } else {
                    inner.trial_in_flight = true;
                    Ok(CallKind::Trial)
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.state {
            // A straggler succeeding after the breaker already opened does
            // not short-circuit the cool-down; recovery goes through the
            // half-open trial.
            CircuitState::Open => {}
            CircuitState::Closed | CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.trial_in_flight = false;
            }
        }
    }

    // Clears an admitted trial that never reported back (caller dropped
    // mid-flight). No-op once on_success/on_failure has already settled it.
    fn abandon_trial(&self) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }

    fn on_failure(&self) -> CircuitState {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.trial_in_flight = false;
        match inner.state {
            CircuitState::HalfOpen => {
                // Failed trial: back to open with a fresh cool-down.
                inner.state = CircuitState::Open;
                inner.opened_at = Instant::now();
            }
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.state = CircuitState::Open;
                    inner.opened_at = Instant::now();
                }
            }
            // A straggler failing after the breaker already opened does not
            // extend the cool-down.
            CircuitState::Open => {}
        }
        inner.state
    }
}

// Releases the half-open trial slot if the wrapping future is dropped
// before the trial settles (e.g. the whole request hit its deadline).
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        self.breaker.abandon_trial();
    }
}

/// Wraps any adapter call with timeout, retry-with-backoff, a circuit
/// breaker, and a concurrency bulkhead. Backend-agnostic: parameterized
/// only by config and the wrapped future's output type.
pub struct Resilience {
    backend: String,
    config: ResilienceConfig,
    breaker: CircuitBreaker,
    bulkhead: Semaphore,
}

impl Resilience {
    pub fn new(backend: impl Into<String>, config: ResilienceConfig) -> Self {
        let backend = backend.into();
        let breaker = CircuitBreaker::new(config.failure_threshold, config.open_for);
        let bulkhead = Semaphore::new(config.max_in_flight);
        Resilience {
            backend,
            config,
            breaker,
            bulkhead,
        }
    }

    pub fn backend(&self) -> &str {
        &self.backend
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    pub async fn call<T, F, Fut>(&self, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        // Bulkhead first: a capacity rejection must not consume the one
        // half-open trial slot.
        let _permit = self
            .bulkhead
            .try_acquire()
            .map_err(|_| FetchError::CapacityExceeded)?;
        let kind = self.breaker.try_acquire()?;
        let _trial_guard = match kind {
            CallKind::Trial => Some(TrialGuard {
                breaker: &self.breaker,
            }),
            CallKind::Normal => None,
        };

        let attempts = match kind {
            CallKind::Trial => 1,
            CallKind::Normal => self.config.max_attempts.max(1),
        };
        let mut backoff = self.config.base_backoff;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let failure = match tokio::time::timeout(self.config.call_timeout, op()).await {
                Ok(Ok(value)) => {
                    self.breaker.on_success();
                    return Ok(value);
                }
                // The backend answered; a definitive negative is neither
                // retried nor held against the breaker.
                Ok(Err(FetchError::NotFound)) => {
                    self.breaker.on_success();
                    return Err(FetchError::NotFound);
                }
                Ok(Err(err)) => err,
                Err(_) => FetchError::Timeout,
            };

            let state = self.breaker.on_failure();
            if state == CircuitState::Open {
                warn!(
                    "{}: circuit opened after failure on attempt {}: {}",
                    self.backend, attempt, failure
                );
                return Err(failure);
            }
            if attempt >= attempts {
                return Err(failure);
            }
            debug!(
                "{}: attempt {} failed ({}), retrying in {:?}",
                self.backend, attempt, failure, backoff
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }
}
