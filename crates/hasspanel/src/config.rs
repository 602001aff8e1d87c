//! Configuration file parsing and structures.
//!
//! hasspanel uses a single TOML file. Only `[server]` is required; every
//! other section falls back to defaults matching the GNOME extension.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing_subscriber::filter::LevelFilter;

use crate::secret::SecretSchema;

/// Top-level configuration structure
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub secret: SecretSchema,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"hasspanel::client" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

fn default_timeout_secs() -> u64 {
    3
}

fn default_user_agent() -> String {
    "hass-gshell".to_string()
}

/// Home Assistant server connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Home Assistant instance, e.g. "http://ha.local:8123/"
    pub base_url: String,

    /// Per-request deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl ServerConfig {
    /// Settings for `base_url` with the default timeout and user agent
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_refresh_interval_secs() -> u64 {
    60
}

/// Which entities the panel shows and how often it refreshes
#[derive(Debug, Clone, Deserialize)]
pub struct PanelConfig {
    /// Togglable entity ids to show; empty shows every switch and light
    #[serde(default)]
    pub switches: Vec<String>,

    /// Sensor entity ids to show; empty shows every usable sensor
    #[serde(default)]
    pub sensors: Vec<String>,

    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            switches: Vec::new(),
            sensors: Vec::new(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl PanelConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let mut config: Config = toml::from_str(contents)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        let base_url = self.server.base_url.trim();
        self.server.base_url = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.server.base_url).map_err(|e| {
            ConfigError::Invalid {
                field: "server.base_url",
                message: e.to_string(),
            }
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "server.base_url",
                message: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        if self.server.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "server.timeout_secs",
                message: "must be greater than zero".to_string(),
            });
        }

        if self.panel.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "panel.refresh_interval_secs",
                message: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}
