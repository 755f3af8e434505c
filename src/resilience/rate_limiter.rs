use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::resilience::types::{ApiError, RateLimitConfig};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound on a single sleep while waiting for a token. Tiny refill
/// rates would otherwise overflow `Duration`.
const MAX_TOKEN_WAIT: Duration = Duration::from_secs(60);

/// Continuously refilling token bucket.
///
/// Tokens accrue at `refill_rate` per second up to `capacity`. Each request
/// consumes one token; callers without a token wait until one accrues.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<TokenBucket>,
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn refill(&mut self, capacity: f64, refill_rate: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_refill = now;
    }
}

#[derive(Debug, Clone)]
pub struct RateLimiterStatus {
    pub available_tokens: f64,
    pub capacity: f64,
    pub refill_rate: f64,
}

impl RateLimiter {
    /// Returns `None` when the configuration disables rate limiting.
    pub fn new(config: &RateLimitConfig) -> Option<Self> {
        if !config.is_enabled() {
            return None;
        }

        let capacity = config.burst.max(1) as f64;
        Some(Self {
            capacity,
            refill_rate: config.requests_per_second,
            state: Mutex::new(TokenBucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        })
    }

    /// Wait for a token. Returns [`ApiError::Cancelled`] if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<(), ApiError> {
        loop {
            if cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let wait = {
                let mut bucket = self.state.lock().await;
                bucket.refill(self.capacity, self.refill_rate, Instant::now());
                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    return Ok(());
                }
                let secs = (1.0 - bucket.tokens) / self.refill_rate;
                Duration::try_from_secs_f64(secs)
                    .map_or(MAX_TOKEN_WAIT, |wait| wait.min(MAX_TOKEN_WAIT))
            };

            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting for token");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    pub async fn get_status(&self) -> RateLimiterStatus {
        let mut bucket = self.state.lock().await;
        bucket.refill(self.capacity, self.refill_rate, Instant::now());
        RateLimiterStatus {
            available_tokens: bucket.tokens,
            capacity: self.capacity,
            refill_rate: self.refill_rate,
        }
    }
}

/// Transport wrapper that takes a token from the limiter before every send.
pub struct RateLimitedTransport {
    inner: Arc<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
}

impl RateLimitedTransport {
    pub fn new(inner: Arc<dyn HttpTransport>, limiter: Arc<RateLimiter>) -> Self {
        Self { inner, limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }
}

impl HttpTransport for RateLimitedTransport {
    fn send<'a>(
        &'a self,
        request: HttpRequest,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<HttpResponse, ApiError>> {
        Box::pin(async move {
            self.limiter.acquire(cancel).await?;
            self.inner.send(request, cancel).await
        })
    }
}
