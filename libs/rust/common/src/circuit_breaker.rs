//! Circuit breaker guarding remote key-management endpoints.
//!
//! Secret store and key-wrapping calls go through a named breaker so that a
//! failing endpoint is not hammered while it recovers. State lives behind a
//! synchronous mutex that is never held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally
    Closed,
    /// Requests are rejected without reaching the endpoint
    Open,
    /// A limited number of probe requests are allowed through
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// Consecutive half-open successes before the circuit closes
    pub success_threshold: u32,
    /// How long the circuit stays open before probing
    pub timeout: Duration,
    /// Probe requests allowed while half-open
    pub half_open_max_requests: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            timeout: Duration::from_secs(30),
            half_open_max_requests: 3,
        }
    }
}

impl CircuitBreakerConfig {
    /// Set the failure threshold.
    #[must_use]
    pub const fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the success threshold.
    #[must_use]
    pub const fn with_success_threshold(mut self, threshold: u32) -> Self {
        self.success_threshold = threshold;
        self
    }

    /// Set the open-state timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: u32,
    successes: u32,
    opened_at: Option<Instant>,
    half_open_requests: u32,
}

impl BreakerInner {
    const fn closed() -> Self {
        Self {
            state: CircuitState::Closed,
            failures: 0,
            successes: 0,
            opened_at: None,
            half_open_requests: 0,
        }
    }
}

/// Named circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker for the named endpoint.
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::closed()),
        }
    }

    /// Create a breaker with the default configuration.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Endpoint name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if a request may proceed.
    pub fn allow_request(&self) -> bool {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.timeout);
                if elapsed {
                    inner.state = CircuitState::HalfOpen;
                    inner.successes = 0;
                    inner.half_open_requests = 1;
                    info!(breaker = %self.name, "Circuit half-open, probing endpoint");
                }
                elapsed
            }
            CircuitState::HalfOpen => {
                inner.half_open_requests += 1;
                inner.half_open_requests <= self.config.half_open_max_requests
            }
        }
    }

    /// Record a successful call.
    pub fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.successes += 1;
                if inner.successes >= self.config.success_threshold {
                    *inner = BreakerInner::closed();
                    info!(breaker = %self.name, "Circuit closed");
                }
            }
            CircuitState::Closed => inner.failures = 0,
            CircuitState::Open => {}
        }
    }

    /// Record a failed call.
    pub fn record_failure(&self) {
        let mut inner = self.lock();
        inner.failures += 1;
        let trip = match inner.state {
            CircuitState::Closed => inner.failures >= self.config.failure_threshold,
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if trip {
            inner.state = CircuitState::Open;
            inner.opened_at = Some(Instant::now());
            inner.successes = 0;
            warn!(breaker = %self.name, failures = inner.failures, "Circuit opened");
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failure count.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Force the breaker back to closed.
    pub fn reset(&self) {
        *self.lock() = BreakerInner::closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_closed() {
        let cb = CircuitBreaker::with_defaults("vault");
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
        assert_eq!(cb.name(), "vault");
    }

    #[test]
    fn test_opens_after_failures() {
        let cb = CircuitBreaker::new("kms", CircuitBreakerConfig::default().with_failure_threshold(3));

        for _ in 0..3 {
            cb.record_failure();
        }

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_success_resets_failures() {
        let cb = CircuitBreaker::new("kms", CircuitBreakerConfig::default().with_failure_threshold(3));

        cb.record_failure();
        cb.record_failure();
        cb.record_success();

        assert_eq!(cb.failure_count(), 0);
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_then_closed() {
        let config = CircuitBreakerConfig {
            failure_threshold: 2,
            success_threshold: 2,
            timeout: Duration::from_millis(1),
            half_open_max_requests: 5,
        };
        let cb = CircuitBreaker::new("vault", config);

        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(5));

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        cb.record_success();
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            success_threshold: 1,
            timeout: Duration::from_millis(1),
            half_open_max_requests: 1,
        };
        let cb = CircuitBreaker::new("vault", config);

        cb.record_failure();
        std::thread::sleep(Duration::from_millis(5));
        assert!(cb.allow_request());
        assert!(!cb.allow_request());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_reset() {
        let cb = CircuitBreaker::with_defaults("vault");
        cb.record_failure();
        cb.reset();
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.failure_count(), 0);
    }
}
