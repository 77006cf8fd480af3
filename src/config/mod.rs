//! Configuration management for pagezip
//!
//! Configuration comes from a TOML file and is overridden by command-line
//! arguments. Precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Configuration file
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::export::engine::{DEFAULT_PAGE_SIZE, DEFAULT_ROTATION_THRESHOLD};
use crate::export::ExportOptions;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Export defaults
    #[serde(default)]
    pub export: ExportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Format driver name (csv, xlsx, jsonl)
    #[serde(default = "default_format")]
    pub format: String,

    /// Prefix of the archive entry names
    #[serde(default = "default_base_name")]
    pub base_name: String,

    /// Rows fetched per page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Maximum rows per output file
    #[serde(default = "default_rotation_threshold")]
    pub rotation_threshold: usize,

    /// Offset of the first page
    #[serde(default)]
    pub offset: u64,

    /// Column labels
    #[serde(default)]
    pub fields: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_format() -> String {
    "csv".to_string()
}

fn default_base_name() -> String {
    "export".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_rotation_threshold() -> usize {
    DEFAULT_ROTATION_THRESHOLD
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: default_format(),
            base_name: default_base_name(),
            page_size: default_page_size(),
            rotation_threshold: default_rotation_threshold(),
            offset: 0,
            fields: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::InvalidFormat(format!("{}: {}", path.display(), e))
            }
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Load configuration, falling back to defaults
    ///
    /// An explicit path must exist. Without one, the default path is used
    /// when present.
    ///
    /// # Arguments
    /// * `path` - Optional explicit configuration file
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let default = Self::default_path();
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".pagezip")
            .join("config.toml")
    }

    /// Serialize the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.export.format.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.format".to_string(),
                value: self.export.format.clone(),
            }
            .into());
        }
        if self.export.base_name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "export.base_name".to_string(),
                value: self.export.base_name.clone(),
            }
            .into());
        }
        ExportOptions::from(&self.export).validate()
    }
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PagezipError;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.export.format, "csv");
        assert_eq!(config.export.page_size, 3000);
        assert_eq!(config.export.rotation_threshold, 3000);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [export]
            format = "xlsx"
            page_size = 500

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.export.format, "xlsx");
        assert_eq!(config.export.page_size, 500);
        assert_eq!(config.export.rotation_threshold, 3000);
        assert_eq!(config.export.base_name, "export");
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert!(config.logging.timestamps);
    }

    #[test]
    fn test_validate_rejects_page_size_above_threshold() {
        let mut config = Config::default();
        config.export.page_size = 5000;
        assert!(matches!(
            config.validate(),
            Err(PagezipError::Config(ConfigError::PageSizeExceedsThreshold { .. }))
        ));
    }

    #[test]
    fn test_invalid_toml() {
        assert!(matches!(
            Config::from_toml_str("[export\nformat ="),
            Err(PagezipError::Config(ConfigError::InvalidFormat(_)))
        ));
    }

    #[test]
    fn test_missing_explicit_file() {
        let result = Config::load(Some(Path::new("/no/such/pagezip.toml")));
        assert!(matches!(
            result,
            Err(PagezipError::Config(ConfigError::FileNotFound(_)))
        ));
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = Config::default();
        config.export.fields = vec!["id".to_string(), "name".to_string()];
        let text = config.to_toml_string().unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
    }
}
