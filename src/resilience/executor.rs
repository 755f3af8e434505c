//! Single entry point for resilient network calls.
//!
//! For one logical call the layers nest as
//! `breaker.execute(retry.execute_with_retry(rate_limited_transport.send))`,
//! so a breaker sees the final outcome of a whole retry sequence as a single
//! success or failure.

use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::resilience::circuit_breaker::{BreakerSnapshot, CircuitBreakerRegistry};
use crate::resilience::rate_limiter::{RateLimitedTransport, RateLimiter, RateLimiterStatus};
use crate::resilience::retry::RetryPolicy;
use crate::resilience::types::{ApiError, EndpointCategory, ResilienceConfig};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub struct RequestExecutor {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Option<Arc<RateLimiter>>,
    breakers: CircuitBreakerRegistry,
    retry: RetryPolicy,
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn HttpTransport>, config: &ResilienceConfig) -> Self {
        let rate_limiter = RateLimiter::new(&config.rate_limit).map(Arc::new);
        let transport: Arc<dyn HttpTransport> = match &rate_limiter {
            Some(limiter) => Arc::new(RateLimitedTransport::new(transport, limiter.clone())),
            None => transport,
        };

        Self {
            transport,
            rate_limiter,
            breakers: CircuitBreakerRegistry::new(&config.circuit_breaker),
            retry: RetryPolicy::new(&config.retry),
        }
    }

    /// Rate-limited transport used for every attempt.
    pub fn transport(&self) -> Arc<dyn HttpTransport> {
        self.transport.clone()
    }

    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Send `request` for the logical `endpoint` and return the 2xx response.
    ///
    /// Non-2xx statuses come back as [`ApiError::Status`] carrying the raw
    /// body; interpreting provider error payloads is left to the caller.
    pub async fn execute(
        &self,
        endpoint: &str,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ApiError> {
        self.run(endpoint, cancel, |attempt| {
            self.attempt(endpoint, attempt, request.clone(), cancel)
        })
        .await
    }

    /// Run an arbitrary attempt function under the breaker for `endpoint`'s
    /// category and the retry policy. An already cancelled token wins over
    /// an open breaker. Attempts should go through
    /// [`RequestExecutor::transport`] so they are rate limited.
    pub async fn run<T, F, Fut>(
        &self,
        endpoint: &str,
        cancel: &CancellationToken,
        attempt_fn: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let category = EndpointCategory::from_endpoint(endpoint);
        let retried = self.retry.execute_with_retry(endpoint, cancel, attempt_fn);

        match self.breakers.get(category) {
            Some(breaker) => breaker.execute(|| retried).await,
            None => retried.await,
        }
    }

    async fn attempt(
        &self,
        endpoint: &str,
        attempt: u32,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ApiError> {
        let method = request.method.clone();
        let url = request.url.clone();
        let started = Instant::now();
        debug!(endpoint, attempt, method = %method, url = %url, "Sending request");

        let outcome = self
            .transport
            .send(request, cancel)
            .await
            .and_then(check_status);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Ok(response) => debug!(
                endpoint,
                attempt,
                method = %method,
                url = %url,
                status = response.status,
                elapsed_ms,
                "Request completed"
            ),
            Err(error) => debug!(
                endpoint,
                attempt,
                method = %method,
                url = %url,
                elapsed_ms,
                error = %error,
                "Request failed"
            ),
        }

        outcome
    }

    pub async fn rate_limiter_status(&self) -> Option<RateLimiterStatus> {
        match &self.rate_limiter {
            Some(limiter) => Some(limiter.get_status().await),
            None => None,
        }
    }

    pub fn breaker_snapshots(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshots()
    }
}

/// Turn non-2xx responses into [`ApiError::Status`].
pub fn check_status(response: HttpResponse) -> Result<HttpResponse, ApiError> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status: response.status,
            body: response.text(),
        })
    }
}
