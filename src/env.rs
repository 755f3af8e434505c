//! Environment constants and path utilities for llmctl.
//!
//! This module centralizes the hardcoded paths, directory names and
//! environment variable names used throughout the application.

use std::path::{Path, PathBuf};

/// Main application directory name (hidden directory like .git, .vscode)
pub const LLMCTL_DIR_NAME: &str = ".llmctl";

/// Configuration file name inside an `.llmctl` directory
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration file name when placed directly in the working directory
pub const LOCAL_CONFIG_FILE_NAME: &str = "llmctl.toml";

/// System-wide configuration file (Unix-like systems)
pub const SYSTEM_CONFIG_FILE: &str = "/etc/llmctl/config.toml";

/// Environment variables read by the client
pub mod vars {
    /// API key, used when the config file does not carry one
    pub const API_KEY: &str = "LLMCTL_API_KEY";

    /// Overrides the provider base URL
    pub const BASE_URL: &str = "LLMCTL_BASE_URL";

    /// Standard tracing filter override
    pub const LOG_FILTER: &str = "RUST_LOG";
}

/// Cache-related directory names
pub mod cache {
    /// Cache root directory name within .llmctl
    pub const CACHE_DIR_NAME: &str = "cache";

    /// Search result cache directory name within the cache root
    pub const SEARCH_DIR_NAME: &str = "search";
}

/// Build the main .llmctl directory path from a root (home or project)
pub fn llmctl_dir_path(root: &Path) -> PathBuf {
    root.join(LLMCTL_DIR_NAME)
}

/// Build the cache root directory path
pub fn cache_dir_path(root: &Path) -> PathBuf {
    llmctl_dir_path(root).join(cache::CACHE_DIR_NAME)
}

/// Build the search result cache directory path
pub fn search_cache_dir_path(root: &Path) -> PathBuf {
    cache_dir_path(root).join(cache::SEARCH_DIR_NAME)
}

/// Build config directory path in user's home directory
pub fn user_config_dir_path(home_dir: &Path) -> PathBuf {
    llmctl_dir_path(home_dir)
}

/// Build config file path in user's home directory
pub fn user_config_file_path(home_dir: &Path) -> PathBuf {
    user_config_dir_path(home_dir).join(CONFIG_FILE_NAME)
}

/// Build local config file path in current directory
pub fn local_config_file_path(current_dir: &Path) -> PathBuf {
    current_dir.join(LLMCTL_DIR_NAME).join(CONFIG_FILE_NAME)
}

/// Home directory from `HOME`, falling back to `USERPROFILE`
pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// Default search cache location: `~/.llmctl/cache/search`, or
/// `./.llmctl/cache/search` when no home directory is known.
pub fn default_search_cache_dir() -> PathBuf {
    match home_dir() {
        Some(home) => search_cache_dir_path(&home),
        None => search_cache_dir_path(Path::new(".")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_path_construction() {
        let root = Path::new("/home/user");

        assert_eq!(llmctl_dir_path(root), Path::new("/home/user/.llmctl"));
        assert_eq!(cache_dir_path(root), Path::new("/home/user/.llmctl/cache"));
        assert_eq!(
            search_cache_dir_path(root),
            Path::new("/home/user/.llmctl/cache/search")
        );
    }

    #[test]
    fn test_config_paths() {
        let home_dir = Path::new("/home/user");
        let current_dir = Path::new("/current/project");

        assert_eq!(
            user_config_file_path(home_dir),
            Path::new("/home/user/.llmctl/config.toml")
        );

        assert_eq!(
            local_config_file_path(current_dir),
            Path::new("/current/project/.llmctl/config.toml")
        );
    }

    #[test]
    #[serial]
    fn test_default_search_cache_dir_uses_home() {
        let original = std::env::var_os("HOME");
        unsafe { std::env::set_var("HOME", "/tmp/llmctl-home") };

        assert_eq!(
            default_search_cache_dir(),
            Path::new("/tmp/llmctl-home/.llmctl/cache/search")
        );

        match original {
            Some(value) => unsafe { std::env::set_var("HOME", value) },
            None => unsafe { std::env::remove_var("HOME") },
        }
    }
}
