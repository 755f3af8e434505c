//! # llmctl
//!
//! A command-line client for LLM provider REST APIs: chat completion, web
//! search, web page reading, model listing, image and video generation and
//! vision analysis.
//!
//! ## Architecture Overview
//!
//! Every network call is funnelled through one request executor that layers
//! three cross-cutting concerns around a single HTTP exchange:
//!
//! - **[`resilience`]**: circuit breakers per endpoint category, retries with
//!   exponential backoff and jitter, and a token-bucket rate limiter applied
//!   at the transport level
//! - **[`client`]**: the provider API client and the transport abstraction it
//!   sends through
//! - **[`enrichment`]**: concurrent fetching of pages linked from a prompt
//! - **[`cache`]**: TTL-based on-disk cache for web search results
//! - **[`cli`]**: argument parsing and configuration discovery
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llmctl::client::{ApiClient, ChatOptions, ClientConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut config = ClientConfig::default();
//!     config.apply_env();
//!
//!     let client = ApiClient::new(&config)?;
//!     let response = client
//!         .chat(
//!             "Summarize https://tokio.rs/",
//!             &ChatOptions::default(),
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!
//!     println!("{}", response.content);
//!     Ok(())
//! }
//! ```

/// Resilient request execution.
///
/// Circuit breakers, retry policy, rate limiter and the executor that
/// composes them, plus the error taxonomy shared by all of them.
pub mod resilience;

/// Provider API client and HTTP transport abstraction.
pub mod client;

/// Prompt enrichment with the content of linked pages.
pub mod enrichment;

/// On-disk search result cache.
pub mod cache;

/// Environment constants and path utilities.
///
/// Centralizes all hardcoded paths and directory names used throughout
/// the application for easier maintenance and consistency.
pub mod env;

// CLI module for command-line interface
pub mod cli;

pub use cache::{SearchCache, SearchOptions, SearchResult};
pub use client::{ApiClient, ClientConfig};
pub use enrichment::ContentEnricher;
pub use resilience::{ApiError, CircuitBreaker, RateLimiter, RequestExecutor, RetryPolicy};
