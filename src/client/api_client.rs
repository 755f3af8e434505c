use crate::cache::{SearchCache, SearchOptions, SearchResult};
use crate::client::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::client::types::*;
use crate::enrichment::{ContentEnricher, FetchedContent};
use crate::resilience::executor::RequestExecutor;
use crate::resilience::types::ApiError;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub mod endpoints {
    pub const CHAT: &str = "chat_completions";
    pub const WEB_SEARCH: &str = "web_search";
    pub const READER: &str = "reader";
    pub const MODELS: &str = "models";
    pub const IMAGES: &str = "images";
    pub const VIDEOS: &str = "videos";
    pub const VISION: &str = "vision";
}

mod paths {
    pub const CHAT: &str = "chat/completions";
    pub const WEB_SEARCH: &str = "web_search";
    pub const READER: &str = "reader";
    pub const MODELS: &str = "models";
    pub const IMAGES: &str = "images/generations";
    pub const VIDEOS: &str = "videos/generations";
}

/// Client for the provider's REST API.
///
/// Every call goes through one [`RequestExecutor`], so all operations share
/// the same rate limiter and per-category circuit breakers.
pub struct ApiClient {
    config: ApiConfig,
    executor: RequestExecutor,
    cache: Option<SearchCache>,
    cache_ttl: Duration,
    enricher: Option<ContentEnricher>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let transport =
            ReqwestTransport::new(config.api.timeout(), config.api.connect_timeout())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Build a client on top of an arbitrary transport.
    pub fn with_transport(config: &ClientConfig, transport: Arc<dyn HttpTransport>) -> Self {
        let cache = config
            .cache
            .enabled
            .then(|| SearchCache::new(config.cache.resolved_directory()));
        let enricher = config
            .enrichment
            .enabled
            .then(|| ContentEnricher::new(config.enrichment.options()));

        debug!(
            base_url = %config.api.base_url,
            cache = cache.is_some(),
            enrichment = enricher.is_some(),
            rate_limit = config.rate_limit.is_enabled(),
            circuit_breaker = config.circuit_breaker.enabled,
            "Creating API client"
        );

        Self {
            config: config.api.clone(),
            executor: RequestExecutor::new(transport, &config.resilience()),
            cache,
            cache_ttl: config.cache.ttl(),
            enricher,
        }
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn cache(&self) -> Option<&SearchCache> {
        self.cache.as_ref()
    }

    /// Send a chat completion for `prompt`.
    ///
    /// Unless disabled in `options`, pages linked from the prompt are fetched
    /// through the reader endpoint and appended before sending.
    pub async fn chat(
        &self,
        prompt: &str,
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ApiError> {
        if prompt.trim().is_empty() {
            return Err(ApiError::InvalidRequest("Prompt must not be empty".to_string()));
        }

        let content = match &self.enricher {
            Some(enricher) if options.enrich => {
                enricher
                    .enrich(prompt, cancel, |url| self.read_owned(url, cancel))
                    .await
            }
            _ => prompt.to_string(),
        };

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = options.system.as_deref().filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(content));

        let model = options.model.as_deref().unwrap_or(&self.config.chat_model);
        self.complete(endpoints::CHAT, model, &messages, options, cancel)
            .await
    }

    /// Ask the vision model about the image at `image_url`.
    pub async fn analyze_vision(
        &self,
        image_url: &str,
        prompt: &str,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ApiError> {
        let parsed = url::Url::parse(image_url)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid image URL {}: {}", image_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https" | "data") {
            return Err(ApiError::InvalidRequest(format!(
                "Unsupported image URL scheme: {}",
                parsed.scheme()
            )));
        }

        let messages = [ChatMessage::user_with_image(image_url, prompt)];
        let model = model.unwrap_or(&self.config.vision_model);
        self.complete(
            endpoints::VISION,
            model,
            &messages,
            &ChatOptions::default(),
            cancel,
        )
        .await
    }

    async fn complete(
        &self,
        endpoint: &str,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ApiError> {
        let body = ChatCompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        };
        let request = HttpRequest::post_json(self.url(paths::CHAT), &body)?;
        let response = self.call(endpoint, request, cancel).await?;
        ChatResponse::from_value(response.json()?)
    }

    /// Run a web search, serving from and filling the result cache when
    /// `use_cache` is set and caching is enabled.
    ///
    /// A failed cache write is logged; the fresh results are still returned.
    pub async fn web_search(
        &self,
        query: &str,
        options: &SearchOptions,
        use_cache: bool,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>, ApiError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ApiError::InvalidRequest(
                "Search query must not be empty".to_string(),
            ));
        }

        let cache = self.cache.as_ref().filter(|_| use_cache);
        if let Some(cache) = cache
            && let Some(results) = cache.get(query, options).await
        {
            info!(query, results = results.len(), "Serving search results from cache");
            return Ok(results);
        }

        let effective = options.effective();
        let mut body = json!({
            "search_engine": "search_std",
            "search_query": query,
            "count": effective.count,
            "search_recency_filter": effective.recency_filter.as_str(),
            "content_size": effective.content_size.as_str(),
        });
        if let Some(domain) = &effective.domain_filter {
            body["search_domain_filter"] = Value::String(domain.clone());
        }

        let request = HttpRequest::post_json(self.url(paths::WEB_SEARCH), &body)?;
        let response = self.call(endpoints::WEB_SEARCH, request, cancel).await?;
        let results = response.json::<WebSearchResponse>()?.search_result;

        if let Some(cache) = cache
            && let Err(e) = cache.set(query, options, results.clone(), self.cache_ttl).await
        {
            warn!(query, "Failed to cache search results: {}", e);
        }

        Ok(results)
    }

    /// Fetch the readable content of a web page through the reader endpoint.
    pub async fn read(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<FetchedContent, ApiError> {
        let body = json!({
            "url": url,
            "return_format": "markdown",
            "retain_images": false,
        });
        let request = HttpRequest::post_json(self.url(paths::READER), &body)?;
        let response = self.call(endpoints::READER, request, cancel).await?;
        Ok(response
            .json::<ReaderResponse>()?
            .reader_result
            .into_fetched(url))
    }

    async fn read_owned(
        &self,
        url: String,
        cancel: &CancellationToken,
    ) -> Result<FetchedContent, ApiError> {
        self.read(&url, cancel).await
    }

    pub async fn list_models(&self, cancel: &CancellationToken) -> Result<Vec<ModelInfo>, ApiError> {
        let request = HttpRequest::get(self.url(paths::MODELS));
        let response = self.call(endpoints::MODELS, request, cancel).await?;
        Ok(response.json::<ModelList>()?.data)
    }

    pub async fn generate_image(
        &self,
        prompt: &str,
        options: &ImageOptions,
        cancel: &CancellationToken,
    ) -> Result<GeneratedImage, ApiError> {
        let body = json!({
            "model": options.model.as_deref().unwrap_or(&self.config.image_model),
            "prompt": prompt,
            "size": options.size.as_deref().unwrap_or(DEFAULT_IMAGE_SIZE),
        });
        let request = HttpRequest::post_json(self.url(paths::IMAGES), &body)?;
        let response = self.call(endpoints::IMAGES, request, cancel).await?;
        Ok(GeneratedImage::from_value(response.json()?))
    }

    /// Submit a video generation task. The provider renders asynchronously;
    /// the returned task identifies the job.
    pub async fn generate_video(
        &self,
        prompt: &str,
        model: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<VideoTask, ApiError> {
        let body = json!({
            "model": model.unwrap_or(&self.config.video_model),
            "prompt": prompt,
        });
        let request = HttpRequest::post_json(self.url(paths::VIDEOS), &body)?;
        let response = self.call(endpoints::VIDEOS, request, cancel).await?;
        Ok(VideoTask::from_value(response.json()?))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn call(
        &self,
        endpoint: &str,
        request: HttpRequest,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ApiError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                ApiError::InvalidRequest(format!(
                    "No API key configured; set {}",
                    crate::env::vars::API_KEY
                ))
            })?;
        let request = request
            .with_bearer_token(api_key)
            .with_header("Accept", "application/json");

        self.executor
            .execute(endpoint, request, cancel)
            .await
            .map_err(provider_error)
    }
}

/// Turn a terminal status carrying a structured provider error body into
/// [`ApiError::Provider`]. Anything else passes through untouched.
pub fn provider_error(error: ApiError) -> ApiError {
    if error.is_retryable() {
        return error;
    }
    let ApiError::Status { status, body } = &error else {
        return error;
    };
    let Ok(parsed) = serde_json::from_str::<ProviderErrorBody>(body) else {
        return error;
    };

    ApiError::Provider {
        status: *status,
        code: parsed.error.code.map(|code| match code {
            Value::String(code) => code,
            other => other.to_string(),
        }),
        message: parsed
            .error
            .message
            .unwrap_or_else(|| "Unknown provider error".to_string()),
    }
}
