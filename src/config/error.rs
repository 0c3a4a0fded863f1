//! Errors raised while loading or validating the harness config file.

use std::path::PathBuf;
use thiserror::Error;

/// Why a [`ProbeConfig`](super::ProbeConfig) could not be produced.
///
/// Any of these stops a run before it contacts the gateway.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file exists but could not be read
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// An explicitly requested config file is absent
    #[error("config file {0} does not exist")]
    NotFound(PathBuf),

    /// TOML syntax or type mismatch
    #[error("malformed config file: {0}")]
    Parse(String),

    /// A value parsed but is unusable, e.g. a URL without scheme
    #[error("invalid value for '{field}': {message}")]
    Validation { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_describe_the_config_file() {
        let missing = ConfigError::NotFound(PathBuf::from("gateway.toml"));
        assert_eq!(missing.to_string(), "config file gateway.toml does not exist");

        let invalid = ConfigError::Validation {
            field: "gateway.url".to_string(),
            message: "must start with http:// or https://".to_string(),
        };
        assert!(invalid.to_string().starts_with("invalid value for 'gateway.url'"));
    }
}
