//! Configuration for the port-probe binary.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values. The core
//! library takes no configuration; this module only serves `main`.

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Which side of the paired check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Verify the port is free and stand up the echo server.
    Server,
    /// Dial the target and verify the echo round-trip.
    Client,
}

/// Command-line arguments for the probe
#[derive(Parser, Debug)]
#[command(name = "port-probe")]
#[command(version = "0.1.0")]
#[command(about = "Paired TCP echo checks for port reachability", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Which side of the check to run
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// Port to bind (server) or dial (client)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Target host for client checks
    #[arg(long)]
    pub host: Option<String>,

    /// Dial timeout in seconds for client checks
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Probe-related configuration
#[derive(Debug, Deserialize)]
pub struct ProbeConfig {
    /// Which side of the check to run
    pub mode: Option<Mode>,
    /// Port to bind or dial
    pub port: Option<u16>,
    /// Target host for client checks
    #[serde(default = "default_host")]
    pub host: String,
    /// Dial timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            mode: None,
            port: None,
            host: default_host(),
            timeout_secs: default_timeout_secs(),
        }
    }
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

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub port: u16,
    pub host: String,
    pub timeout: Duration,
    pub log_level: String,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::resolve(cli, toml_config)
    }

    /// Merge CLI args with TOML config (CLI takes precedence).
    fn resolve(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let mode = cli
            .mode
            .or(toml_config.probe.mode)
            .ok_or(ConfigError::Missing("mode"))?;
        let port = cli
            .port
            .or(toml_config.probe.port)
            .ok_or(ConfigError::Missing("port"))?;

        Ok(Config {
            mode,
            port,
            host: cli.host.unwrap_or(toml_config.probe.host),
            timeout: Duration::from_secs(cli.timeout.unwrap_or(toml_config.probe.timeout_secs)),
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                toml_config.logging.level
            },
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Missing(&'static str),
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
            ConfigError::Missing(field) => {
                write!(
                    f,
                    "Missing required setting '{field}' (set it via CLI or config file)"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
