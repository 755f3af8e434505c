//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./llmctl.toml or ./.llmctl/config.toml
//! 2. User config: ~/.llmctl/config.toml
//! 3. System config: /etc/llmctl/config.toml
//! 4. Built-in defaults
//!
//! An explicit `--config` path bypasses discovery. Environment variables are
//! applied on top of whatever was loaded.

use crate::client::ClientConfig;
use crate::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Where the active configuration came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Defaults,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "{}", path.display()),
            ConfigSource::Defaults => write!(f, "built-in defaults"),
        }
    }
}

impl ClientConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to TOML file. The API key is never written.
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill in settings supplied through environment variables.
    ///
    /// `LLMCTL_API_KEY` is used only when the file carries no key;
    /// `LLMCTL_BASE_URL` always wins over the file.
    pub fn apply_env(&mut self) {
        if self.api.api_key.as_deref().is_none_or(|key| key.trim().is_empty())
            && let Ok(key) = std::env::var(env::vars::API_KEY)
            && !key.trim().is_empty()
        {
            debug!("Using API key from {}", env::vars::API_KEY);
            self.api.api_key = Some(key.trim().to_string());
        }

        if let Ok(base_url) = std::env::var(env::vars::BASE_URL)
            && !base_url.trim().is_empty()
        {
            debug!("Using base URL from {}", env::vars::BASE_URL);
            self.api.base_url = base_url.trim().to_string();
        }
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Load the configuration from `explicit` if given, otherwise through the
    /// discovery hierarchy, then apply environment overrides.
    pub fn load(explicit: Option<&Path>) -> Result<(ClientConfig, ConfigSource), ConfigError> {
        let (mut config, source) = match explicit {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                (
                    ClientConfig::from_toml_file(path)?,
                    ConfigSource::File(path.to_path_buf()),
                )
            }
            None => Self::discover_config()?,
        };
        config.apply_env();
        Ok((config, source))
    }

    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<(ClientConfig, ConfigSource), ConfigError> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            let config = ClientConfig::from_toml_file(&config_path)?;
            return Ok((config, ConfigSource::File(config_path)));
        }

        info!("No configuration file found, using defaults");
        Ok((ClientConfig::default(), ConfigSource::Defaults))
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        Self::first_existing(Self::get_config_candidates())
    }

    fn first_existing(candidates: Vec<PathBuf>) -> Option<PathBuf> {
        for candidate in candidates {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let current_dir = std::env::current_dir().ok();
        let home_dir = env::home_dir();
        Self::candidates_for(current_dir.as_deref(), home_dir.as_deref())
    }

    fn candidates_for(current_dir: Option<&Path>, home_dir: Option<&Path>) -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Some(current_dir) = current_dir {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(current_dir));
        }

        if let Some(home_dir) = home_dir {
            candidates.push(env::user_config_file_path(home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from(env::SYSTEM_CONFIG_FILE));

        #[cfg(windows)]
        if let Ok(program_data) = std::env::var("PROGRAMDATA") {
            candidates.push(PathBuf::from(program_data).join("llmctl").join("config.toml"));
        }

        candidates
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf, ConfigError> {
        let home_dir = env::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Self::create_default_config_in(&home_dir)
    }

    fn create_default_config_in(home_dir: &Path) -> Result<PathBuf, ConfigError> {
        let config_dir = env::user_config_dir_path(home_dir);
        let config_path = env::user_config_file_path(home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir).map_err(|source| ConfigError::Write {
                path: config_dir.clone(),
                source,
            })?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            ClientConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        let candidates = Self::get_config_candidates();
        for (i, candidate) in candidates.iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        if let Some(found) = Self::find_config_file() {
            println!("Active configuration: {:?}", found);
        } else {
            println!("Active configuration: Built-in defaults");
        }

        let key_status = match std::env::var(env::vars::API_KEY) {
            Ok(key) if !key.trim().is_empty() => "set",
            _ => "not set",
        };
        println!("{}: {}", env::vars::API_KEY, key_status);
    }
}
