//! Gateway connection configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Where the gateway lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Gateway base URL
    pub url: String,
    /// Total per-request timeout, including reading a streamed body
    pub timeout_seconds: u64,
    /// TCP connect timeout, kept separate from the read budget
    pub connect_timeout_seconds: u64,
    /// Timeout for the reachability check
    pub health_timeout_seconds: u64,
    /// Static credential forwarded as `x-api-key` on Anthropic-style requests
    pub api_key: String,
    /// Value for the `anthropic-version` request header
    pub anthropic_version: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:40114".to_string(),
            timeout_seconds: 30,
            connect_timeout_seconds: 5,
            health_timeout_seconds: 5,
            api_key: "test-key".to_string(),
            anthropic_version: "2023-06-01".to_string(),
        }
    }
}

impl GatewayConfig {
    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }
}
