use crate::resilience::types::{ApiError, RetryConfig, RetrySettings};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exponent ceiling for `2^(attempt - 1)`; keeps the multiplication finite.
const MAX_BACKOFF_EXPONENT: u32 = 62;

/// Jitter amplitude as a fraction of the base delay (±12.5%).
const JITTER_RATIO: f64 = 0.125;

/// Un-jittered delay before the attempt following `attempt`:
/// `min(initial × 2^(attempt − 1), max)`.
pub fn base_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
    let secs = initial.as_secs_f64() * 2f64.powi(exponent as i32);

    if !secs.is_finite() || secs >= max.as_secs_f64() {
        max
    } else {
        Duration::from_secs_f64(secs)
    }
}

/// Jittered delay, uniformly spread over `[0.875 × base, 1.125 × base]`.
pub fn calculate_backoff(attempt: u32, initial: Duration, max: Duration) -> Duration {
    let base = base_backoff(attempt, initial, max);
    let jitter = JITTER_RATIO * (rand::random::<f64>() * 2.0 - 1.0);
    let secs = base.as_secs_f64() * (1.0 + jitter);
    Duration::from_secs_f64(secs.max(0.0))
}

/// Per-call retry bookkeeping. Lives for one logical call only.
#[derive(Debug)]
struct RetryContext {
    attempt: u32,
    max_attempts: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
    last_error: Option<ApiError>,
}

impl RetryContext {
    fn new(settings: RetrySettings) -> Self {
        Self {
            attempt: 0,
            max_attempts: settings.max_attempts,
            initial_backoff: settings.initial_backoff,
            max_backoff: settings.max_backoff,
            last_error: None,
        }
    }

    fn next_delay(&self) -> Duration {
        calculate_backoff(self.attempt, self.initial_backoff, self.max_backoff)
    }
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    settings: RetrySettings,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            settings: config.resolve(),
        }
    }

    pub fn with_settings(settings: RetrySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> RetrySettings {
        self.settings
    }

    /// Run `attempt_fn` until it succeeds, fails with a non-retryable error,
    /// or the attempt budget is spent.
    ///
    /// `attempt_fn` receives the 1-based attempt number. Exhaustion returns
    /// [`ApiError::RetriesExhausted`] wrapping the last error; cancellation
    /// during a backoff sleep returns [`ApiError::Cancelled`].
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation: &str,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut ctx = RetryContext::new(self.settings);

        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            ctx.attempt += 1;
            let error = match attempt_fn(ctx.attempt).await {
                Ok(value) => {
                    if let Some(previous) = &ctx.last_error {
                        debug!(
                            operation,
                            attempt = ctx.attempt,
                            recovered_from = %previous,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(value);
                }
                Err(error) if !error.is_retryable() => return Err(error),
                Err(error) => error,
            };

            if ctx.attempt >= ctx.max_attempts {
                warn!(
                    operation,
                    attempts = ctx.attempt,
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(ApiError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts: ctx.attempt,
                    source: Box::new(error),
                });
            }

            let delay = ctx.next_delay();
            warn!(
                operation,
                attempt = ctx.attempt,
                max_attempts = ctx.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable failure, backing off"
            );
            ctx.last_error = Some(error);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&RetryConfig::default())
    }
}
