//! Configuration module for the probe
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`OLLA_PROBE_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use probe::config::ProbeConfig;
//!
//! let config = ProbeConfig::default();
//! assert_eq!(config.gateway.url, "http://localhost:40114");
//!
//! let toml = r#"
//! [gateway]
//! url = "http://olla.lan:40114"
//! "#;
//! let config: ProbeConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.gateway.url, "http://olla.lan:40114");
//! ```

pub mod error;
pub mod gateway;
pub mod logging;
pub mod modes;
pub mod timing;

pub use error::ConfigError;
pub use gateway::GatewayConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use modes::ModeConfig;
pub use timing::TimingThresholds;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for a probe run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProbeConfig {
    /// Gateway location, credentials and timeouts
    pub gateway: GatewayConfig,
    /// Backend type to protocol mode tables
    pub modes: ModeConfig,
    /// Timing classifier thresholds
    pub timing: TimingThresholds,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl ProbeConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("OLLA_PROBE_URL") {
            self.gateway.url = url;
        }
        if let Ok(timeout) = std::env::var("OLLA_PROBE_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.gateway.timeout_seconds = t;
            }
        }
        if let Ok(key) = std::env::var("OLLA_PROBE_API_KEY") {
            self.gateway.api_key = key;
        }

        if let Ok(level) = std::env::var("OLLA_PROBE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("OLLA_PROBE_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.url.trim().is_empty() {
            return Err(ConfigError::Validation {
                field: "gateway.url".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        }
        if !self.gateway.url.starts_with("http://") && !self.gateway.url.starts_with("https://") {
            return Err(ConfigError::Validation {
                field: "gateway.url".to_string(),
                message: format!("expected an http(s) URL, got '{}'", self.gateway.url),
            });
        }
        if self.gateway.timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "gateway.timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }
        if self.gateway.connect_timeout_seconds == 0 {
            return Err(ConfigError::Validation {
                field: "gateway.connect_timeout_seconds".to_string(),
                message: "timeout must be non-zero".to_string(),
            });
        }

        self.modes.validate()?;
        self.timing.validate()?;

        Ok(())
    }
}
