use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SEARCH_COUNT: u32 = 10;
pub const MAX_SEARCH_COUNT: u32 = 50;
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_secs: u64,
    /// Defaults to `~/.llmctl/cache/search` when unset.
    pub directory: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            directory: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn resolved_directory(&self) -> PathBuf {
        self.directory
            .clone()
            .unwrap_or_else(crate::env::default_search_cache_dir)
    }
}

/// One web search hit.
///
/// Fields the client does not know about are kept in `extra` so that a cache
/// round trip returns exactly what the provider sent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecencyFilter {
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
    #[default]
    NoLimit,
}

impl RecencyFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecencyFilter::OneDay => "oneDay",
            RecencyFilter::OneWeek => "oneWeek",
            RecencyFilter::OneMonth => "oneMonth",
            RecencyFilter::OneYear => "oneYear",
            RecencyFilter::NoLimit => "noLimit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "oneday" | "day" | "1d" => Some(Self::OneDay),
            "oneweek" | "week" | "1w" => Some(Self::OneWeek),
            "onemonth" | "month" | "1m" => Some(Self::OneMonth),
            "oneyear" | "year" | "1y" => Some(Self::OneYear),
            "nolimit" | "none" | "any" => Some(Self::NoLimit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentSize {
    #[default]
    Medium,
    High,
}

impl ContentSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentSize::Medium => "medium",
            ContentSize::High => "high",
        }
    }
}

/// How results are rendered. Has no effect on what the provider returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Search options as supplied by the caller. Unset fields take defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOptions {
    pub count: Option<u32>,
    pub domain_filter: Option<String>,
    pub recency_filter: Option<RecencyFilter>,
    pub content_size: Option<ContentSize>,
    pub format: Option<OutputFormat>,
}

/// The result-affecting subset of [`SearchOptions`] with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveSearchOptions {
    pub count: u32,
    pub domain_filter: Option<String>,
    pub recency_filter: RecencyFilter,
    pub content_size: ContentSize,
}

impl SearchOptions {
    pub fn effective(&self) -> EffectiveSearchOptions {
        EffectiveSearchOptions {
            count: self
                .count
                .filter(|count| *count > 0)
                .unwrap_or(DEFAULT_SEARCH_COUNT)
                .min(MAX_SEARCH_COUNT),
            domain_filter: self
                .domain_filter
                .as_deref()
                .map(|domain| domain.trim().trim_end_matches('/').to_ascii_lowercase())
                .filter(|domain| !domain.is_empty()),
            recency_filter: self.recency_filter.unwrap_or_default(),
            content_size: self.content_size.unwrap_or_default(),
        }
    }
}

/// On-disk cache record, one file per entry named `<hash>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub cached_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub hash: String,
}

impl CacheEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub directory: PathBuf,
    pub total_entries: usize,
    pub expired_entries: usize,
    pub corrupt_entries: usize,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupStats {
    pub scanned: usize,
    pub removed_expired: usize,
    pub removed_corrupt: usize,
    pub removed_temp: usize,
    pub errors: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Cache TTL must be a positive, representable duration")]
    InvalidTtl,
}
