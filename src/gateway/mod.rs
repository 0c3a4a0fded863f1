//! HTTP access to the gateway under test.
//!
//! One request is in flight at a time. Each call carries the connect and total
//! timeouts from [`GatewayConfig`]; nothing is retried.

mod error;
pub mod headers;

pub use error::ProbeError;
pub use headers::ResponseMeta;

use crate::config::GatewayConfig;
use serde_json::Value;
use std::time::Duration;

/// Gateway routes the probe depends on.
pub mod routes {
    pub const HEALTH: &str = "/internal/health";
    pub const STATUS: &str = "/internal/status";
    pub const STATUS_ENDPOINTS: &str = "/internal/status/endpoints";
    pub const STATUS_MODELS: &str = "/internal/status/models";
    pub const MODEL_STATS: &str = "/internal/stats/models";
    pub const TRANSLATOR_STATS: &str = "/internal/stats/translators";
    pub const PROCESS: &str = "/internal/process";
    pub const VERSION: &str = "/version";
    pub const UNIFIED_MODELS: &str = "/olla/models";
    pub const ANTHROPIC_MODELS: &str = "/olla/anthropic/v1/models";
    pub const ANTHROPIC_MESSAGES: &str = "/olla/anthropic/v1/messages";
    pub const ANTHROPIC_COUNT_TOKENS: &str = "/olla/anthropic/v1/messages/count_tokens";
    pub const OPENAI_CHAT: &str = "/olla/openai/v1/chat/completions";
    pub const PROXY_MODELS: &str = "/olla/proxy/v1/models";
    pub const PROXY_CHAT: &str = "/olla/proxy/v1/chat/completions";
    pub const OLLAMA_GENERATE: &str = "/olla/ollama/api/generate";

    /// `/olla/{slug}{suffix}`, e.g. `/olla/lm-studio/v1/models`.
    pub fn provider(slug: &str, suffix: &str) -> String {
        format!("/olla/{}{}", slug, suffix)
    }

    /// Unified model list rendered in one provider's format.
    pub fn models_in_format(format: &str) -> String {
        format!("{}?format={}", UNIFIED_MODELS, format)
    }

    /// Unified lookup of one model by id.
    pub fn unified_model(id: &str) -> String {
        format!("{}/{}", UNIFIED_MODELS, id)
    }
}

/// Thin client around a single gateway base URL.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    base_url: String,
    client: reqwest::Client,
    config: GatewayConfig,
}

impl GatewayClient {
    /// Create a client with the configured connect and total timeouts.
    pub fn new(config: &GatewayConfig) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProbeError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self::with_client(config, client))
    }

    /// Create a client around a prebuilt reqwest client (for testing).
    pub fn with_client(config: &GatewayConfig, client: reqwest::Client) -> Self {
        Self {
            base_url: config.base_url().to_string(),
            client,
            config: config.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Total budget for one request, used when reporting timeouts.
    pub fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /internal/health`; anything but 200 is fatal for the run.
    pub async fn check_health(&self) -> Result<(), ProbeError> {
        let url = self.url(routes::HEALTH);
        let response = self
            .client
            .get(&url)
            .timeout(self.config.health_timeout())
            .send()
            .await
            .map_err(|e| ProbeError::Unreachable {
                url: self.base_url.clone(),
                reason: e.to_string(),
            })?;

        if response.status().as_u16() != 200 {
            return Err(ProbeError::Unreachable {
                url: self.base_url.clone(),
                reason: format!("health check returned HTTP {}", response.status().as_u16()),
            });
        }

        tracing::debug!(url = %url, "gateway reachable");
        Ok(())
    }

    /// GET a path; the response is returned for any status.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response, ProbeError> {
        self.client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))
    }

    /// GET a path and return the body text, failing on non-success statuses.
    pub async fn get_text(&self, path: &str) -> Result<String, ProbeError> {
        let response = self.get(path).await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))?;

        if !status.is_success() {
            return Err(ProbeError::Upstream {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        Ok(body)
    }

    /// POST an Anthropic Messages request with the static credentials.
    pub async fn post_messages(&self, body: &Value) -> Result<reqwest::Response, ProbeError> {
        self.post_anthropic(routes::ANTHROPIC_MESSAGES, body).await
    }

    /// POST to an Anthropic-style route with the static credentials.
    pub async fn post_anthropic(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<reqwest::Response, ProbeError> {
        let request = self
            .client
            .post(self.url(path))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.anthropic_version)
            .json(body);

        let response = request
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))?;

        tracing::debug!(
            path = %path,
            status = response.status().as_u16(),
            mode = ?response.headers().get(headers::MODE_HEADER),
            "anthropic response"
        );
        Ok(response)
    }

    /// POST a JSON body to an arbitrary gateway route.
    ///
    /// The response is returned for any status; callers decide what counts as success.
    pub async fn post_json(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<reqwest::Response, ProbeError> {
        self.client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))
    }

    /// POST a body verbatim with a JSON content type, valid or not.
    pub async fn post_raw(&self, path: &str, body: &str) -> Result<reqwest::Response, ProbeError> {
        self.client
            .post(self.url(path))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))
    }

    /// Read a whole response body as JSON.
    pub async fn read_json(&self, response: reqwest::Response) -> Result<Value, ProbeError> {
        let text = response
            .text()
            .await
            .map_err(|e| ProbeError::from_reqwest(e, self.timeout()))?;
        serde_json::from_str(&text).map_err(|e| ProbeError::InvalidResponse(e.to_string()))
    }
}

/// Cut a body down to `max` characters for diagnostics.
pub fn truncate(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        trimmed.to_string()
    } else {
        let cut: String = trimmed.chars().take(max).collect();
        format!("{}...", cut)
    }
}
