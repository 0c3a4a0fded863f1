//! X-Olla-* response headers read by the probe.
//!
//! The gateway reveals its routing decisions through response headers. Only
//! the mode indicator is load-bearing; the rest feed advisory notes.

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use serde::Serialize;

/// Declares that the request was forwarded without protocol translation.
pub const MODE_HEADER: &str = "x-olla-mode";
/// Name of the endpoint that served the request.
pub const ENDPOINT_HEADER: &str = "x-olla-endpoint";
/// Model the request was routed for.
pub const MODEL_HEADER: &str = "x-olla-model";
/// Backend type of the serving endpoint.
pub const BACKEND_TYPE_HEADER: &str = "x-olla-backend-type";
/// Gateway-assigned request identifier.
pub const REQUEST_ID_HEADER: &str = "x-olla-request-id";
/// Gateway-measured response time.
pub const RESPONSE_TIME_HEADER: &str = "x-olla-response-time";

/// Value of [`MODE_HEADER`] for passthrough responses.
pub const PASSTHROUGH_MODE: &str = "passthrough";

/// Response status plus the headers the probe cares about.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseMeta {
    pub status: u16,
    pub mode: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub backend_type: Option<String>,
    pub request_id: Option<String>,
    pub response_time: Option<String>,
    pub content_type: Option<String>,
}

impl ResponseMeta {
    pub fn from_headers(status: u16, headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        Self {
            status,
            mode: get(MODE_HEADER),
            endpoint: get(ENDPOINT_HEADER),
            model: get(MODEL_HEADER),
            backend_type: get(BACKEND_TYPE_HEADER),
            request_id: get(REQUEST_ID_HEADER),
            response_time: get(RESPONSE_TIME_HEADER),
            content_type: get(CONTENT_TYPE.as_str()),
        }
    }

    pub fn from_response(response: &reqwest::Response) -> Self {
        Self::from_headers(response.status().as_u16(), response.headers())
    }

    /// True when the gateway declared passthrough mode.
    pub fn is_passthrough(&self) -> bool {
        self.mode.as_deref() == Some(PASSTHROUGH_MODE)
    }

    pub fn is_event_stream(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.contains("text/event-stream"))
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Routing headers every proxied response should carry, by display name.
    pub fn missing_routing_headers(&self) -> Vec<&'static str> {
        [
            ("X-Olla-Endpoint", &self.endpoint),
            ("X-Olla-Model", &self.model),
            ("X-Olla-Backend-Type", &self.backend_type),
            ("X-Olla-Request-ID", &self.request_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| name)
        .collect()
    }
}
