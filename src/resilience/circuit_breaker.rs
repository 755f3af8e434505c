//! Per-category circuit breakers.
//!
//! ```text
//! Closed   --(failure_threshold consecutive failures)--> Open
//! Open     --(open_timeout elapsed, next call)---------> HalfOpen (one probe)
//! HalfOpen --(success_threshold successes)-------------> Closed
//! HalfOpen --(any failure)-----------------------------> Open
//! ```

use crate::resilience::types::{ApiError, CircuitBreakerConfig, EndpointCategory};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "closed"),
            CircuitState::Open => write!(f, "open"),
            CircuitState::HalfOpen => write!(f, "half_open"),
        }
    }
}

#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: Mutex<BreakerState>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_transition: Instant,
    probe_in_flight: bool,
}

/// Point-in-time view of a breaker, for status output.
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub since_transition: Duration,
}

/// Admission ticket for one call. Dropping it without recording an outcome
/// (the caller's future was dropped) releases a held half-open probe slot.
struct Admission<'a> {
    breaker: &'a CircuitBreaker,
    is_probe: bool,
    settled: bool,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        if self.is_probe && !self.settled {
            self.breaker.lock().probe_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_transition: Instant::now(),
                probe_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Run `operation` under the breaker.
    ///
    /// Returns [`ApiError::BreakerOpen`] without running the operation while
    /// the breaker is open. Cancelled operations are not counted either way.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, ApiError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut admission = self.admit()?;
        let result = operation().await;
        admission.settled = true;

        match &result {
            Ok(_) => self.record_success(admission.is_probe),
            Err(error) if error.counts_as_failure() => {
                self.record_failure(error, admission.is_probe)
            }
            Err(_) => self.release_probe(admission.is_probe),
        }

        result
    }

    fn admit(&self) -> Result<Admission<'_>, ApiError> {
        let mut inner = self.lock();

        let is_probe = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                if inner.last_transition.elapsed() < self.config.open_timeout() {
                    return Err(self.open_error());
                }
                self.transition(&mut inner, CircuitState::HalfOpen, None);
                true
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    return Err(self.open_error());
                }
                true
            }
        };

        if is_probe {
            inner.probe_in_flight = true;
        }

        Ok(Admission {
            breaker: self,
            is_probe,
            settled: false,
        })
    }

    fn record_success(&self, was_probe: bool) {
        let mut inner = self.lock();
        if was_probe {
            inner.probe_in_flight = false;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = 0;
                inner.consecutive_successes = 0;
            }
            // Only the probe speaks for a half-open breaker; a call admitted
            // while closed may still be finishing.
            CircuitState::HalfOpen if was_probe => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold.max(1) {
                    self.transition(&mut inner, CircuitState::Closed, None);
                }
            }
            CircuitState::HalfOpen => {}
            // A call admitted while closed finished after another call opened
            // the breaker; the open window stands.
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self, error: &ApiError, was_probe: bool) {
        let mut inner = self.lock();
        if was_probe {
            inner.probe_in_flight = false;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold.max(1) {
                    self.transition(&mut inner, CircuitState::Open, Some(error));
                }
            }
            CircuitState::HalfOpen if was_probe => {
                self.transition(&mut inner, CircuitState::Open, Some(error));
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn release_probe(&self, was_probe: bool) {
        if was_probe {
            self.lock().probe_in_flight = false;
        }
    }

    fn transition(&self, inner: &mut BreakerState, to: CircuitState, error: Option<&ApiError>) {
        let from = inner.state;
        inner.state = to;
        inner.last_transition = Instant::now();
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        if to != CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }

        let error = error.map(|e| e.to_string()).unwrap_or_default();
        if to == CircuitState::Open {
            warn!(
                breaker = %self.name,
                from = %from,
                to = %to,
                error = %error,
                "Circuit breaker state transition"
            );
        } else {
            info!(
                breaker = %self.name,
                from = %from,
                to = %to,
                error = %error,
                "Circuit breaker state transition"
            );
        }
    }

    fn open_error(&self) -> ApiError {
        ApiError::BreakerOpen {
            category: self.name.clone(),
            cool_down: self.config.open_timeout(),
        }
    }

    /// Force the breaker closed with zeroed counters.
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            self.transition(&mut inner, CircuitState::Closed, None);
        }
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.probe_in_flight = false;
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            since_transition: inner.last_transition.elapsed(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One breaker per endpoint category, owned by a single client instance.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: HashMap<EndpointCategory, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Builds breakers for every known category plus the shared default.
    /// A disabled configuration yields an empty registry, so every lookup
    /// bypasses breaking.
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        let mut breakers = HashMap::new();
        if config.enabled {
            for category in EndpointCategory::KNOWN
                .into_iter()
                .chain(std::iter::once(EndpointCategory::Default))
            {
                breakers.insert(
                    category,
                    Arc::new(CircuitBreaker::new(category.as_str(), config.clone())),
                );
            }
        }
        Self { breakers }
    }

    pub fn is_enabled(&self) -> bool {
        !self.breakers.is_empty()
    }

    pub fn get(&self, category: EndpointCategory) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .get(&category)
            .or_else(|| self.breakers.get(&EndpointCategory::Default))
            .cloned()
    }

    pub fn for_endpoint(&self, endpoint: &str) -> Option<Arc<CircuitBreaker>> {
        self.get(EndpointCategory::from_endpoint(endpoint))
    }

    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.values().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.values() {
            breaker.reset();
        }
    }
}
