//! Bench configuration loaded from TOML.
//!
//! ```toml
//! log_level = "debug"
//! fixture = "power"
//!
//! [serial]
//! port = "/dev/ttyACM0"
//! baud_rate = 115200
//! timeout_ms = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fixture::FixtureKind;
use crate::protocol::DEFAULT_RESPONSE_TIMEOUT;
use crate::transport::DEFAULT_BAUD_RATE;

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found")]
    FileNotFound,

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Serial link to the logic board.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SerialConfig {
    pub port: String,
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Bound on the wait for each response.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_timeout_ms() -> u64 {
    DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64
}

impl SerialConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default)]
    pub log_level: LogLevel,
    #[serde(default)]
    pub fixture: FixtureKind,
    pub serial: Option<SerialConfig>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            fixture: FixtureKind::Logic,
            serial: None,
        }
    }
}

impl BenchConfig {
    /// Loads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;
        let config: Self = content.parse()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(serial) = &self.serial {
            if serial.port.is_empty() {
                return Err(ConfigError::ValidationError(
                    "serial.port cannot be empty".to_string(),
                ));
            }
            if serial.baud_rate == 0 {
                return Err(ConfigError::ValidationError(
                    "serial.baud_rate must be non-zero".to_string(),
                ));
            }
            if serial.timeout_ms == 0 {
                return Err(ConfigError::ValidationError(
                    "serial.timeout_ms must be non-zero".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl std::str::FromStr for BenchConfig {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }
}
