use crate::cache::CacheConfig;
use crate::enrichment::{EnrichmentConfig, FetchedContent};
use crate::resilience::types::{
    ApiError, CircuitBreakerConfig, RateLimitConfig, ResilienceConfig, RetryConfig,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.z.ai/api/paas/v4";
pub const DEFAULT_CHAT_MODEL: &str = "glm-4.6";
pub const DEFAULT_VISION_MODEL: &str = "glm-4.5v";
pub const DEFAULT_IMAGE_MODEL: &str = "cogview-4";
pub const DEFAULT_VIDEO_MODEL: &str = "cogvideox-3";
pub const DEFAULT_IMAGE_SIZE: &str = "1024x1024";

/// Provider connection settings.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Never written back to disk; usually supplied through `LLMCTL_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub chat_model: String,
    pub vision_model: String,
    pub image_model: String,
    pub video_model: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            timeout_secs: 120,
            connect_timeout_secs: 10,
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("chat_model", &self.chat_model)
            .field("vision_model", &self.vision_model)
            .field("image_model", &self.image_model)
            .field("video_model", &self.video_model)
            .finish()
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs.max(1))
    }
}

/// Everything needed to construct an [`ApiClient`](super::ApiClient).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub enrichment: EnrichmentConfig,
}

impl ClientConfig {
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            retry: self.retry.clone(),
            circuit_breaker: self.circuit_breaker.clone(),
            rate_limit: self.rate_limit.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Value,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: Value::String(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: Value::String(text.into()),
        }
    }

    /// User message carrying an image reference followed by a question.
    pub fn user_with_image(image_url: &str, text: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::json!([
                { "type": "image_url", "image_url": { "url": image_url } },
                { "type": "text", "text": text },
            ]),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ChatCompletionRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Append the content of linked pages to the prompt.
    pub enrich: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: None,
            system: None,
            temperature: None,
            max_tokens: None,
            enrich: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub model: Option<String>,
    pub content: String,
    pub raw: Value,
}

impl ChatResponse {
    pub(crate) fn from_value(raw: Value) -> Result<Self, ApiError> {
        let content = raw
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| ApiError::Decode("Response has no message content".to_string()))?
            .to_string();
        let model = raw.get("model").and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            model,
            content,
            raw,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owned_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebSearchResponse {
    #[serde(default)]
    pub search_result: Vec<crate::cache::SearchResult>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReaderResponse {
    pub reader_result: ReaderResult,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReaderResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url: Option<String>,
}

impl ReaderResult {
    pub fn into_fetched(self, requested_url: &str) -> FetchedContent {
        FetchedContent {
            url: self.url.unwrap_or_else(|| requested_url.to_string()),
            title: self.title,
            body: self.content,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageOptions {
    pub model: Option<String>,
    pub size: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub urls: Vec<String>,
    pub raw: Value,
}

impl GeneratedImage {
    pub(crate) fn from_value(raw: Value) -> Self {
        let urls = raw
            .get("data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.get("url").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Self { urls, raw }
    }
}

/// Video generation runs asynchronously on the provider side; this is the
/// submitted task, not the finished video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoTask {
    pub id: Option<String>,
    pub status: Option<String>,
    pub raw: Value,
}

impl VideoTask {
    pub(crate) fn from_value(raw: Value) -> Self {
        let field = |name: &str| raw.get(name).and_then(Value::as_str).map(str::to_string);
        Self {
            id: field("id"),
            status: field("task_status"),
            raw: raw.clone(),
        }
    }
}

/// Provider error payload: `{"error": {"code": ..., "message": ...}}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorBody {
    pub error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProviderErrorDetail {
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
}
