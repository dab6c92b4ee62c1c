//! Configuration module for probe-server.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the diagnostic server
#[derive(Parser, Debug)]
#[command(name = "probe-server")]
#[command(author = "probe-server authors")]
#[command(version = "0.1.0")]
#[command(about = "A diagnostic HTTP server for synthetic load, latency and faults", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Address to bind to (e.g., 0.0.0.0:8080)
    #[arg(short = 'l', long)]
    pub listen: Option<String>,

    /// Number of worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Largest block_count accepted by /post-heavy (unbounded when unset)
    #[arg(long)]
    pub max_block_count: Option<u64>,

    /// Seconds to wait for in-flight requests after a termination signal
    #[arg(long)]
    pub shutdown_grace: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub load: LoadConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server-related configuration
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address to bind to
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Number of worker threads
    pub workers: Option<usize>,
    /// Grace period for draining connections on shutdown, in seconds
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            workers: None,
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

/// Load simulation configuration
#[derive(Debug, Deserialize, Default)]
pub struct LoadConfig {
    /// Ceiling on the number of 10 MiB blocks a single request may allocate
    pub max_block_count: Option<u64>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_grace() -> u64 {
    35 // outlasts the 30s fixed delay endpoint
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub listen: String,
    pub workers: Option<usize>,
    pub shutdown_grace: u64,
    pub max_block_count: Option<u64>,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen: default_listen(),
            workers: None,
            shutdown_grace: default_shutdown_grace(),
            max_block_count: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let config = Config {
            listen: cli.listen.unwrap_or(toml_config.server.listen),
            workers: cli.workers.or(toml_config.server.workers),
            shutdown_grace: cli
                .shutdown_grace
                .unwrap_or(toml_config.server.shutdown_grace),
            max_block_count: cli.max_block_count.or(toml_config.load.max_block_count),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        };

        if config.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1"));
        }
        if config.max_block_count == Some(0) {
            return Err(ConfigError::Invalid("max_block_count must be at least 1"));
        }

        Ok(config)
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for ConfigError {}
