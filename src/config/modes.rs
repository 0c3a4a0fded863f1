//! Backend type to protocol mode tables

use super::ConfigError;
use crate::reconciler::ExpectedMode;
use serde::{Deserialize, Serialize};

/// The two disjoint backend type sets that decide the expected protocol mode.
///
/// Membership is matched case-insensitively. A type present in neither set maps
/// to [`ExpectedMode::Untested`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModeConfig {
    /// Backend types that natively speak the Anthropic Messages API
    pub passthrough_types: Vec<String>,
    /// Backend types the gateway must translate for
    pub translation_types: Vec<String>,
}

impl Default for ModeConfig {
    fn default() -> Self {
        Self {
            passthrough_types: ["vllm", "vllm-mlx", "lm-studio", "ollama", "llamacpp", "lemonade"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            translation_types: ["openai-compatible", "litellm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ModeConfig {
    /// Expected mode for a backend type.
    pub fn mode_for(&self, backend_type: &str) -> ExpectedMode {
        let contains = |set: &[String]| set.iter().any(|t| t.eq_ignore_ascii_case(backend_type));

        if contains(&self.passthrough_types) {
            ExpectedMode::Passthrough
        } else if contains(&self.translation_types) {
            ExpectedMode::Translation
        } else {
            ExpectedMode::Untested
        }
    }

    /// Reject empty type names and any type listed in both sets.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(i) = self
            .passthrough_types
            .iter()
            .position(|t| t.trim().is_empty())
        {
            return Err(ConfigError::Validation {
                field: format!("modes.passthrough_types[{}]", i),
                message: "type cannot be empty".to_string(),
            });
        }
        if let Some(i) = self
            .translation_types
            .iter()
            .position(|t| t.trim().is_empty())
        {
            return Err(ConfigError::Validation {
                field: format!("modes.translation_types[{}]", i),
                message: "type cannot be empty".to_string(),
            });
        }

        let overlap: Vec<&str> = self
            .passthrough_types
            .iter()
            .filter(|p| {
                self.translation_types
                    .iter()
                    .any(|t| t.eq_ignore_ascii_case(p))
            })
            .map(String::as_str)
            .collect();

        if !overlap.is_empty() {
            return Err(ConfigError::Validation {
                field: "modes".to_string(),
                message: format!(
                    "backend types listed as both passthrough and translation: {}",
                    overlap.join(", ")
                ),
            });
        }

        Ok(())
    }
}
