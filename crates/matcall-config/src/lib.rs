//! Configuration system for matcall
//!
//! Sources, highest priority first:
//! 1. Command-line arguments (applied by the binary)
//! 2. Environment variables
//! 3. Configuration files (.matcall.toml, .matcall.yaml, etc.)
//! 4. Built-in defaults

use anyhow::{Context, Result};
use clap::ValueEnum;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "MATCALL_CONFIG";

/// Main matcall configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MatcallConfig {
    /// Engine process settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// Session startup settings
    #[serde(default)]
    pub session: SessionConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How to start the engine bridge process
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executable speaking the JSON-lines engine protocol on stdin/stdout
    #[serde(default = "default_engine_command")]
    pub command: String,
    /// Extra arguments for the engine executable
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Directories added to the engine search path on start
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    /// Add every source directory below each search path
    #[serde(default)]
    pub recursive: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default)]
    pub level: LogLevel,
    /// Enable debug logging
    #[serde(default)]
    pub debug: bool,
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Filter string understood by `env_logger`
    pub fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl LoggingConfig {
    /// Effective filter, with `debug` taking precedence over `level`
    pub fn filter(&self) -> &'static str {
        if self.debug {
            LogLevel::Debug.as_filter()
        } else {
            self.level.as_filter()
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            command: default_engine_command(),
            args: Vec::new(),
        }
    }
}

fn default_engine_command() -> String {
    "matcall-engine".to_string()
}

/// Configuration loader with multiple source support
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<MatcallConfig> {
        Self::load_with(None)
    }

    /// Like [`ConfigLoader::load`], but an explicit file replaces the search.
    pub fn load_with(explicit: Option<&Path>) -> Result<MatcallConfig> {
        let mut config = match explicit {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => Self::load_from_files()?,
        };
        Self::apply_environment_variables(&mut config)?;
        Ok(config)
    }

    fn load_from_files() -> Result<MatcallConfig> {
        match Self::locate() {
            Some(path) => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => {
                debug!("No configuration file found, using defaults");
                Ok(MatcallConfig::default())
            }
        }
    }

    /// First existing config file in search order
    pub fn locate() -> Option<PathBuf> {
        Self::find_config_files()
            .into_iter()
            .find(|path| path.is_file())
    }

    /// Potential configuration file paths, in order of preference
    pub fn find_config_files() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        if let Ok(config_path) = env::var(CONFIG_ENV) {
            if !config_path.is_empty() {
                paths.push(PathBuf::from(config_path));
            }
        }

        let names = [
            ".matcall.toml",
            ".matcall.yaml",
            ".matcall.yml",
            ".matcall.json",
            "matcall.config.toml",
            "matcall.config.yaml",
            "matcall.config.yml",
            "matcall.config.json",
        ];

        if let Ok(current_dir) = env::current_dir() {
            paths.extend(names.iter().map(|name| current_dir.join(name)));
        }

        if let Some(home_dir) = dirs::home_dir() {
            paths.extend(names[..4].iter().map(|name| home_dir.join(name)));
            paths.push(home_dir.join(".config/matcall/config.toml"));
            paths.push(home_dir.join(".config/matcall/config.yaml"));
        }

        paths
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<MatcallConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            Some("toml") => toml::from_str(&content)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            _ => {
                if let Ok(config) = toml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_yaml::from_str(&content) {
                    config
                } else if let Ok(config) = serde_json::from_str(&content) {
                    config
                } else {
                    return Err(anyhow::anyhow!(
                        "Could not parse config file {} (tried TOML, YAML, JSON)",
                        path.display()
                    ));
                }
            }
        };

        Ok(config)
    }

    /// Apply environment variable overrides
    pub fn apply_environment_variables(config: &mut MatcallConfig) -> Result<()> {
        if let Ok(command) = env::var("MATCALL_ENGINE_COMMAND") {
            if !command.trim().is_empty() {
                config.engine.command = command.trim().to_string();
            }
        }

        if let Ok(args) = env::var("MATCALL_ENGINE_ARGS") {
            config.engine.args = args.split_whitespace().map(str::to_string).collect();
        }

        if let Some(paths) = env::var_os("MATLABPATH") {
            for path in env::split_paths(&paths) {
                if !path.as_os_str().is_empty() && !config.session.search_paths.contains(&path) {
                    config.session.search_paths.push(path);
                }
            }
        }

        if let Ok(level) = env::var("MATCALL_LOG_LEVEL") {
            config.logging.level = parse_log_level(&level)
                .with_context(|| format!("Invalid MATCALL_LOG_LEVEL: {level}"))?;
        }

        if let Some(flag) = env::var("MATCALL_DEBUG").ok().and_then(|v| parse_bool(&v)) {
            config.logging.debug = flag;
        }

        Ok(())
    }

    /// Save configuration to a file, choosing the format by extension
    pub fn save_to_file(config: &MatcallConfig, path: &Path) -> Result<()> {
        let content = match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => {
                serde_yaml::to_string(config).context("Failed to serialize config to YAML")?
            }
            Some("json") => serde_json::to_string_pretty(config)
                .context("Failed to serialize config to JSON")?,
            _ => toml::to_string_pretty(config).context("Failed to serialize config to TOML")?,
        };

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        info!("Configuration saved to: {}", path.display());
        Ok(())
    }
}

/// Parse a boolean value from string with various formats
pub fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enable" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disable" | "disabled" => Some(false),
        "" => Some(false),
        _ => None,
    }
}

pub fn parse_log_level(s: &str) -> Option<LogLevel> {
    <LogLevel as ValueEnum>::from_str(s.trim(), true).ok()
}
