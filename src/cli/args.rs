//! Command line argument parsing
//!
//! This module handles CLI argument parsing with subcommands:
//! - `chat`: Send a prompt, enriching it with the content of linked pages
//! - `search`: Web search with on-disk result caching
//! - `read`: Extract the readable content of a web page
//! - `models`: List available models
//! - `image` / `video`: Generation requests
//! - `vision`: Ask a question about an image
//! - `cache`: Inspect and maintain the search cache
//! - `status`: Show circuit breaker and rate limiter state
//! - `show-config` / `init-config`: Configuration discovery helpers

use crate::cache::{RecencyFilter, SearchOptions};
use crate::client::{ChatOptions, ImageOptions};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug)]
pub enum ExecutionMode {
    Chat { prompt: String, options: ChatOptions },
    Search(SearchConfig),
    Read { url: String },
    Models,
    Image { prompt: String, options: ImageOptions },
    Video { prompt: String, model: Option<String> },
    Vision(VisionConfig),
    Cache(CacheAction),
    Status,
    ShowConfig,
    InitConfig,
}

#[derive(Debug)]
pub struct SearchConfig {
    pub query: String,
    pub options: SearchOptions,
    pub use_cache: bool,
}

#[derive(Debug)]
pub struct VisionConfig {
    pub image_url: String,
    pub prompt: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Remove every cached search result
    Clear,
    /// Remove expired and corrupt entries
    Cleanup,
    /// Show cache statistics
    Stats,
}

#[derive(Debug, Parser)]
#[command(name = "llmctl")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Command-line client for LLM provider APIs with resilient request handling")]
#[command(long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Args {
    /// Configuration file path (skips discovery)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Send a chat prompt
    Chat {
        /// Prompt text
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Model to use instead of the configured default
        #[arg(short = 'm', long = "model")]
        model: Option<String>,
        /// System prompt
        #[arg(short = 's', long = "system")]
        system: Option<String>,
        /// Sampling temperature
        #[arg(short = 't', long = "temperature")]
        temperature: Option<f32>,
        /// Do not fetch pages linked from the prompt
        #[arg(long = "no-enrich")]
        no_enrich: bool,
    },
    /// Search the web
    Search {
        /// Search query
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
        /// Number of results
        #[arg(short = 'n', long = "count")]
        count: Option<u32>,
        /// Restrict results to a domain
        #[arg(short = 'd', long = "domain")]
        domain: Option<String>,
        /// Recency filter: day, week, month, year or none
        #[arg(short = 'r', long = "recency", value_parser = parse_recency)]
        recency: Option<RecencyFilter>,
        /// Bypass the result cache
        #[arg(long = "no-cache")]
        no_cache: bool,
        /// Print results as JSON
        #[arg(long = "json")]
        json: bool,
    },
    /// Extract the readable content of a web page
    Read {
        /// Page URL
        url: String,
    },
    /// List available models
    Models,
    /// Generate an image
    Image {
        /// Image description
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Image size, e.g. 1024x1024
        #[arg(long = "size")]
        size: Option<String>,
        /// Model to use instead of the configured default
        #[arg(short = 'm', long = "model")]
        model: Option<String>,
    },
    /// Submit a video generation task
    Video {
        /// Video description
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Model to use instead of the configured default
        #[arg(short = 'm', long = "model")]
        model: Option<String>,
    },
    /// Ask a question about an image
    Vision {
        /// Image URL (http, https or data URL)
        image_url: String,
        /// Question about the image
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Model to use instead of the configured default
        #[arg(short = 'm', long = "model")]
        model: Option<String>,
    },
    /// Inspect and maintain the search result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show circuit breaker and rate limiter state
    Status,
    /// Show configuration discovery information
    ShowConfig,
    /// Write a default configuration file to ~/.llmctl/config.toml
    InitConfig,
}

fn parse_recency(value: &str) -> Result<RecencyFilter, String> {
    RecencyFilter::parse(value).ok_or_else(|| {
        format!(
            "invalid recency '{}': expected day, week, month, year or none",
            value
        )
    })
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    /// Tracing filter for the requested verbosity.
    pub fn log_filter(&self) -> &'static str {
        match self.verbose {
            0 => "llmctl=warn",
            1 => "llmctl=info",
            _ => "llmctl=debug",
        }
    }

    pub fn mode(&self) -> Result<ExecutionMode, String> {
        match &self.command {
            Some(Commands::Chat {
                prompt,
                model,
                system,
                temperature,
                no_enrich,
            }) => Ok(ExecutionMode::Chat {
                prompt: join_words(prompt, "prompt")?,
                options: ChatOptions {
                    model: model.clone(),
                    system: system.clone(),
                    temperature: *temperature,
                    max_tokens: None,
                    enrich: !no_enrich,
                },
            }),
            Some(Commands::Search {
                query,
                count,
                domain,
                recency,
                no_cache,
                json,
            }) => Ok(ExecutionMode::Search(SearchConfig {
                query: join_words(query, "query")?,
                options: SearchOptions {
                    count: *count,
                    domain_filter: domain.clone(),
                    recency_filter: *recency,
                    content_size: None,
                    format: Some(if *json {
                        crate::cache::OutputFormat::Json
                    } else {
                        crate::cache::OutputFormat::Text
                    }),
                },
                use_cache: !no_cache,
            })),
            Some(Commands::Read { url }) => Ok(ExecutionMode::Read { url: url.clone() }),
            Some(Commands::Models) => Ok(ExecutionMode::Models),
            Some(Commands::Image {
                prompt,
                size,
                model,
            }) => Ok(ExecutionMode::Image {
                prompt: join_words(prompt, "prompt")?,
                options: ImageOptions {
                    model: model.clone(),
                    size: size.clone(),
                },
            }),
            Some(Commands::Video { prompt, model }) => Ok(ExecutionMode::Video {
                prompt: join_words(prompt, "prompt")?,
                model: model.clone(),
            }),
            Some(Commands::Vision {
                image_url,
                prompt,
                model,
            }) => Ok(ExecutionMode::Vision(VisionConfig {
                image_url: image_url.clone(),
                prompt: join_words(prompt, "prompt")?,
                model: model.clone(),
            })),
            Some(Commands::Cache { action }) => Ok(ExecutionMode::Cache(*action)),
            Some(Commands::Status) => Ok(ExecutionMode::Status),
            Some(Commands::ShowConfig) => Ok(ExecutionMode::ShowConfig),
            Some(Commands::InitConfig) => Ok(ExecutionMode::InitConfig),
            None => Err(
                "No command specified. Use 'llmctl --help' to see available commands.".to_string(),
            ),
        }
    }
}

fn join_words(words: &[String], what: &str) -> Result<String, String> {
    let joined = words.join(" ");
    if joined.trim().is_empty() {
        return Err(format!("The {} must not be empty", what));
    }
    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::OutputFormat;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_chat_command() {
        let args = parse(&[
            "llmctl", "chat", "-m", "glm-4.5", "--no-enrich", "explain", "borrowing",
        ]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::Chat { prompt, options } = mode {
            assert_eq!(prompt, "explain borrowing");
            assert_eq!(options.model.as_deref(), Some("glm-4.5"));
            assert!(!options.enrich);
        } else {
            panic!("Expected Chat mode");
        }
    }

    #[test]
    fn test_search_command() {
        let args = parse(&[
            "llmctl", "search", "rust", "async", "-n", "5", "--domain", "docs.rs", "-r", "week",
            "--json",
        ]);
        let mode = args.mode().unwrap();

        if let ExecutionMode::Search(config) = mode {
            assert_eq!(config.query, "rust async");
            assert_eq!(config.options.count, Some(5));
            assert_eq!(config.options.domain_filter.as_deref(), Some("docs.rs"));
            assert_eq!(config.options.recency_filter, Some(RecencyFilter::OneWeek));
            assert_eq!(config.options.format, Some(OutputFormat::Json));
            assert!(config.use_cache);
        } else {
            panic!("Expected Search mode");
        }
    }

    #[test]
    fn test_search_no_cache() {
        let args = parse(&["llmctl", "search", "tokio", "--no-cache"]);

        if let ExecutionMode::Search(config) = args.mode().unwrap() {
            assert!(!config.use_cache);
            assert_eq!(config.options.format, Some(OutputFormat::Text));
        } else {
            panic!("Expected Search mode");
        }
    }

    #[test]
    fn test_invalid_recency_is_rejected() {
        assert!(Args::try_parse_from(["llmctl", "search", "q", "--recency", "decade"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let args = parse(&["llmctl", "models", "-vv", "--config", "/tmp/custom.toml"]);

        assert_eq!(args.config, Some(PathBuf::from("/tmp/custom.toml")));
        assert_eq!(args.log_filter(), "llmctl=debug");
        assert!(matches!(args.mode().unwrap(), ExecutionMode::Models));

        let quiet = parse(&["llmctl", "status"]);
        assert_eq!(quiet.log_filter(), "llmctl=warn");
    }

    #[test]
    fn test_cache_subcommands() {
        for (name, expected) in [
            ("clear", CacheAction::Clear),
            ("cleanup", CacheAction::Cleanup),
            ("stats", CacheAction::Stats),
        ] {
            let args = parse(&["llmctl", "cache", name]);
            assert!(matches!(args.mode().unwrap(), ExecutionMode::Cache(action) if action == expected));
        }
    }

    #[test]
    fn test_vision_and_image_commands() {
        let args = parse(&[
            "llmctl", "vision", "https://img.example/cat.jpg", "what", "is", "this",
        ]);
        if let ExecutionMode::Vision(config) = args.mode().unwrap() {
            assert_eq!(config.image_url, "https://img.example/cat.jpg");
            assert_eq!(config.prompt, "what is this");
        } else {
            panic!("Expected Vision mode");
        }

        let args = parse(&["llmctl", "image", "a", "crab", "--size", "512x512"]);
        if let ExecutionMode::Image { prompt, options } = args.mode().unwrap() {
            assert_eq!(prompt, "a crab");
            assert_eq!(options.size.as_deref(), Some("512x512"));
        } else {
            panic!("Expected Image mode");
        }
    }

    #[test]
    fn test_blank_prompt_error() {
        let args = parse(&["llmctl", "chat", "  "]);
        assert!(args.mode().is_err());
    }

    #[test]
    fn test_no_command_error() {
        let args = Args {
            config: None,
            verbose: 0,
            command: None,
        };
        let result = args.mode();
        assert!(result.is_err());
    }
}
