use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Retry configuration as it appears in the config file.
///
/// Every field is optional; unset (or zero) values fall back to the defaults
/// when resolved through [`RetryConfig::resolve`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
}

/// Fully resolved retry parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryConfig {
    pub fn resolve(&self) -> RetrySettings {
        let max_attempts = self
            .max_attempts
            .filter(|attempts| *attempts > 0)
            .unwrap_or(DEFAULT_MAX_ATTEMPTS);
        let initial_backoff = self
            .initial_backoff_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_INITIAL_BACKOFF);
        let max_backoff = self
            .max_backoff_ms
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_MAX_BACKOFF);

        RetrySettings {
            max_attempts,
            initial_backoff,
            max_backoff,
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        RetryConfig::default().resolve()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_threshold: 5,
            success_threshold: 2,
            open_timeout_ms: 30_000,
        }
    }
}

/// Token bucket configuration. A `requests_per_second` of zero or less
/// disables rate limiting entirely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub requests_per_second: f64,
    pub burst: u32,
}

impl RateLimitConfig {
    pub fn is_enabled(&self) -> bool {
        self.requests_per_second > 0.0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 0.0,
            burst: 1,
        }
    }
}

/// Settings for the request executor's three layers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
}

/// Logical endpoint categories. Each category gets its own circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointCategory {
    Chat,
    Search,
    Reader,
    Models,
    Images,
    Videos,
    Vision,
    Audio,
    Default,
}

impl EndpointCategory {
    pub const KNOWN: [EndpointCategory; 8] = [
        EndpointCategory::Chat,
        EndpointCategory::Search,
        EndpointCategory::Reader,
        EndpointCategory::Models,
        EndpointCategory::Images,
        EndpointCategory::Videos,
        EndpointCategory::Vision,
        EndpointCategory::Audio,
    ];

    /// Map a logical endpoint name onto its category.
    pub fn from_endpoint(endpoint: &str) -> Self {
        match endpoint.trim().to_ascii_lowercase().as_str() {
            "chat" | "chat_completions" | "completions" => Self::Chat,
            "search" | "web_search" => Self::Search,
            "reader" | "web_reader" | "fetch" => Self::Reader,
            "models" | "list_models" => Self::Models,
            "images" | "image" | "image_generation" => Self::Images,
            "videos" | "video" | "video_generation" | "async_result" => Self::Videos,
            "vision" | "vision_analysis" => Self::Vision,
            "audio" | "transcription" | "speech" => Self::Audio,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Search => "search",
            Self::Reader => "reader",
            Self::Models => "models",
            Self::Images => "images",
            Self::Videos => "videos",
            Self::Vision => "vision",
            Self::Audio => "audio",
            Self::Default => "default",
        }
    }
}

impl fmt::Display for EndpointCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an error should be treated by the retry policy and circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Terminal,
    BreakerOpen,
    Cancelled,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP {status}: {}", body_preview(.body))]
    Status { status: u16, body: String },
    #[error("API error (HTTP {status}{}): {message}", code_suffix(.code))]
    Provider {
        status: u16,
        code: Option<String>,
        message: String,
    },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Failed to decode response: {0}")]
    Decode(String),
    #[error(
        "The {category} service is degraded (circuit breaker open); try again in {}s",
        .cool_down.as_secs().max(1)
    )]
    BreakerOpen {
        category: String,
        cool_down: Duration,
    },
    #[error("{operation} request failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        source: Box<ApiError>,
    },
    #[error("Request cancelled")]
    Cancelled,
}

const RETRYABLE_STATUSES: [u16; 4] = [429, 502, 503, 504];

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Timeout(_) | ApiError::Connection(_) => ErrorKind::Transient,
            ApiError::Status { status, .. } | ApiError::Provider { status, .. }
                if RETRYABLE_STATUSES.contains(status) =>
            {
                ErrorKind::Transient
            }
            ApiError::BreakerOpen { .. } => ErrorKind::BreakerOpen,
            ApiError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Terminal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    /// Whether this outcome should count against a circuit breaker.
    pub fn counts_as_failure(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Terminal)
    }

    /// HTTP status carried by this error, looking through retry wrapping.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::Provider { status, .. } => Some(*status),
            ApiError::RetriesExhausted { source, .. } => source.status(),
            _ => None,
        }
    }
}

fn body_preview(body: &str) -> String {
    const MAX_PREVIEW: usize = 200;
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }
    match trimmed.char_indices().nth(MAX_PREVIEW) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

fn code_suffix(code: &Option<String>) -> String {
    match code {
        Some(code) => format!(", code {}", code),
        None => String::new(),
    }
}
