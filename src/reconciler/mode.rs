//! Expected protocol mode per backend type

use serde::Serialize;
use std::fmt;

/// What the gateway should do with an Anthropic Messages request for a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpectedMode {
    /// Forwarded untouched; the response must carry `X-Olla-Mode: passthrough`
    Passthrough,
    /// Converted to and from the OpenAI wire format
    Translation,
    /// Backend type listed in neither mode table; checks are skipped
    Untested,
}

impl ExpectedMode {
    pub fn label(&self) -> &'static str {
        match self {
            ExpectedMode::Passthrough => "passthrough",
            ExpectedMode::Translation => "translation",
            ExpectedMode::Untested => "untested",
        }
    }

    pub fn is_testable(&self) -> bool {
        !matches!(self, ExpectedMode::Untested)
    }
}

impl fmt::Display for ExpectedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModeConfig;

    #[test]
    fn test_default_tables() {
        let modes = ModeConfig::default();
        for t in ["vllm", "vllm-mlx", "lm-studio", "ollama", "llamacpp", "lemonade"] {
            assert_eq!(modes.mode_for(t), ExpectedMode::Passthrough, "{}", t);
        }
        for t in ["openai-compatible", "litellm"] {
            assert_eq!(modes.mode_for(t), ExpectedMode::Translation, "{}", t);
        }
        assert_eq!(modes.mode_for("sglang"), ExpectedMode::Untested);
    }

    #[test]
    fn test_mode_lookup_ignores_case() {
        assert_eq!(
            ModeConfig::default().mode_for("LM-Studio"),
            ExpectedMode::Passthrough
        );
    }

    #[test]
    fn test_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExpectedMode::Translation).unwrap(),
            "\"translation\""
        );
        assert_eq!(ExpectedMode::Untested.to_string(), "untested");
        assert!(!ExpectedMode::Untested.is_testable());
    }
}
