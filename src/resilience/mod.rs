pub mod circuit_breaker;
pub mod executor;
pub mod rate_limiter;
pub mod retry;
pub mod types;


pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerRegistry, CircuitState};
pub use executor::RequestExecutor;
pub use rate_limiter::{RateLimitedTransport, RateLimiter, RateLimiterStatus};
pub use retry::{RetryPolicy, calculate_backoff};
pub use types::*;
