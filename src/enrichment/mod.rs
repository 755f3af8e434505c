//! Prompt enrichment: fetch the pages a prompt links to and append their
//! content so the model can read them.
//!
//! Fetches run concurrently. Each one owns a slot indexed by the URL's
//! position in the prompt, and blocks are emitted in slot order regardless of
//! which fetch finished first. Failed fetches are skipped with a warning.

pub mod urls;

#[cfg(test)]
pub mod tests;

pub use urls::extract_urls;

use crate::resilience::types::ApiError;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_MAX_URLS: usize = 5;
pub const DEFAULT_MAX_CONCURRENT: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 20_000;

const TRUNCATION_MARKER: &str = "[truncated]";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub enabled: bool,
    pub max_urls: usize,
    pub max_concurrent: usize,
    /// Overall budget for all fetches; 0 disables the limit.
    pub timeout_secs: u64,
    pub max_content_chars: usize,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_urls: DEFAULT_MAX_URLS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_content_chars: DEFAULT_MAX_CONTENT_CHARS,
        }
    }
}

impl EnrichmentConfig {
    pub fn options(&self) -> EnrichmentOptions {
        EnrichmentOptions {
            max_urls: self.max_urls,
            max_concurrent: self.max_concurrent.max(1),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
            max_content_chars: self.max_content_chars,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentOptions {
    pub max_urls: usize,
    pub max_concurrent: usize,
    pub timeout: Option<Duration>,
    pub max_content_chars: usize,
}

impl Default for EnrichmentOptions {
    fn default() -> Self {
        EnrichmentConfig::default().options()
    }
}

/// Readable content of one fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedContent {
    pub url: String,
    pub title: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FanIn {
    Complete,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct ContentEnricher {
    options: EnrichmentOptions,
}

impl ContentEnricher {
    pub fn new(options: EnrichmentOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EnrichmentOptions {
        &self.options
    }

    /// Return `prompt` followed by one block per successfully fetched URL.
    ///
    /// A prompt without URLs is returned unchanged and `fetch` is never
    /// called. Cancellation and the overall timeout stop waiting for
    /// outstanding fetches; whatever already completed is still used.
    pub async fn enrich<F, Fut>(&self, prompt: &str, cancel: &CancellationToken, fetch: F) -> String
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<FetchedContent, ApiError>>,
    {
        let urls = extract_urls(prompt, self.options.max_urls);
        if urls.is_empty() {
            return prompt.to_string();
        }

        debug!(urls = urls.len(), "Enriching prompt with linked content");
        let mut slots: Vec<Option<FetchedContent>> = vec![None; urls.len()];

        let outcome = {
            let fan_in = async {
                let mut fetches = std::pin::pin!(
                    stream::iter(urls.iter().cloned().enumerate())
                        .map(|(index, url)| {
                            let fetch_future = fetch(url.clone());
                            async move { (index, url, fetch_future.await) }
                        })
                        .buffer_unordered(self.options.max_concurrent.max(1))
                );

                while let Some((index, url, result)) = fetches.next().await {
                    match result {
                        Ok(content) => slots[index] = Some(content),
                        Err(e) => warn!(url = %url, "Failed to fetch content: {}", e),
                    }
                }
            };
            let deadline = async {
                match self.options.timeout {
                    Some(timeout) => tokio::time::sleep(timeout).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => FanIn::Cancelled,
                _ = deadline => FanIn::TimedOut,
                _ = fan_in => FanIn::Complete,
            }
        };

        let fetched = slots.iter().filter(|slot| slot.is_some()).count();
        match outcome {
            FanIn::Complete => {}
            FanIn::Cancelled => {
                warn!(fetched, total = urls.len(), "Content enrichment cancelled");
            }
            FanIn::TimedOut => {
                warn!(fetched, total = urls.len(), "Content enrichment timed out");
            }
        }

        let blocks: Vec<String> = urls
            .iter()
            .zip(slots)
            .filter_map(|(url, slot)| slot.map(|content| self.format_block(url, &content)))
            .collect();

        if blocks.is_empty() {
            return prompt.to_string();
        }
        format!("{}\n\n{}", prompt, blocks.join("\n\n"))
    }

    fn format_block(&self, url: &str, content: &FetchedContent) -> String {
        let mut block = format!("--- Content from {} ---\n", url);
        if let Some(title) = content.title.as_deref().filter(|t| !t.trim().is_empty()) {
            block.push_str(&format!("Title: {}\n", title.trim()));
        }
        block.push('\n');
        block.push_str(&truncate_chars(content.body.trim(), self.options.max_content_chars));
        block.push_str(&format!("\n--- End of content from {} ---", url));
        block
    }
}

/// Cut `text` to at most `max_chars` characters, marking the cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}\n{}", &text[..byte_index], TRUNCATION_MARKER),
        None => text.to_string(),
    }
}
