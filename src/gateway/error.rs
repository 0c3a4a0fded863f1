//! Error taxonomy for gateway interaction.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to the gateway.
///
/// `Unreachable` and `Discovery` are fatal for a run; every other variant is
/// local to one test case and ends up as the diagnostic of a failed record.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// Health check failed, nothing else can run
    #[error("cannot reach gateway at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    /// No endpoints or models could be resolved
    #[error("discovery failed: {0}")]
    Discovery(String),

    /// Request or body read exceeded its deadline
    #[error("request timeout after {0}s")]
    Timeout(u64),

    /// Connection refused, reset, DNS failure and friends
    #[error("connection failed: {0}")]
    Network(String),

    /// Gateway answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    /// Body did not match the expected shape
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ProbeError {
    /// Map a reqwest failure, reporting timeouts against the budget that was in force.
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProbeError::Timeout(timeout.as_secs())
        } else if err.is_decode() {
            ProbeError::InvalidResponse(err.to_string())
        } else {
            ProbeError::Network(err.to_string())
        }
    }

    /// Map an error surfaced while reading a body line by line.
    ///
    /// Transport errors arrive wrapped in `io::Error`; invalid UTF-8 arrives as
    /// `InvalidData` from the line reader itself.
    pub fn from_body_io(err: std::io::Error, timeout: Duration) -> Self {
        if let Some(inner) = err
            .get_ref()
            .and_then(|e| e.downcast_ref::<reqwest::Error>())
        {
            if inner.is_timeout() {
                return ProbeError::Timeout(timeout.as_secs());
            }
            return ProbeError::Network(inner.to_string());
        }

        match err.kind() {
            std::io::ErrorKind::InvalidData => ProbeError::InvalidResponse(err.to_string()),
            std::io::ErrorKind::TimedOut => ProbeError::Timeout(timeout.as_secs()),
            _ => ProbeError::Network(err.to_string()),
        }
    }
}
