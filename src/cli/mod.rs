//! CLI-specific functionality for llmctl
//!
//! This module contains all CLI-related code including argument parsing,
//! configuration discovery and output rendering.

pub mod args;
pub mod config;
pub mod output;

pub use args::{Args, CacheAction, Commands, ExecutionMode, SearchConfig, VisionConfig};
pub use config::{ConfigDiscovery, ConfigError, ConfigSource};
