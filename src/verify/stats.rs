//! Translator statistics cross-check
//!
//! `/internal/stats/translators` reports gateway-side counters. They are
//! compared against what the probe observed through response headers.

use super::Verification;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rate the gateway may report as a number or as preformatted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Rate {
    Number(f64),
    Text(String),
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Number(n) => write!(f, "{:.2}", n),
            Rate::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorStats {
    pub translator_name: String,
    pub total_requests: u64,
    pub passthrough_requests: u64,
    pub translation_requests: u64,
    pub passthrough_rate: Option<Rate>,
    pub streaming_requests: u64,
    pub non_streaming_requests: u64,
    pub fallback_no_compatible_endpoints: u64,
    pub fallback_translator_does_not_support_passthrough: u64,
    pub fallback_cannot_passthrough: u64,
}

impl TranslatorStats {
    pub fn total_fallbacks(&self) -> u64 {
        self.fallback_no_compatible_endpoints
            + self.fallback_translator_does_not_support_passthrough
            + self.fallback_cannot_passthrough
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsSummary {
    pub overall_passthrough_rate: Option<Rate>,
    pub overall_success_rate: Option<Rate>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorStatsResponse {
    pub translators: Vec<TranslatorStats>,
    pub summary: StatsSummary,
}

impl TranslatorStatsResponse {
    /// The Anthropic translator, matched by name.
    pub fn anthropic(&self) -> Option<&TranslatorStats> {
        self.translators
            .iter()
            .find(|t| t.translator_name.to_ascii_lowercase().contains("anthropic"))
    }
}

/// Compare gateway counters with what the run exercised.
///
/// Counters are cumulative since gateway start, so only lower bounds are checked.
pub fn verify_translator_stats(
    stats: &TranslatorStatsResponse,
    saw_passthrough: bool,
    saw_translation: bool,
) -> Verification {
    let Some(anthropic) = stats.anthropic() else {
        if saw_passthrough || saw_translation {
            return Verification::fail("no anthropic translator in stats");
        }
        return Verification::skip("no translator stats available yet");
    };

    let mut result = Verification::pass();

    if (saw_passthrough || saw_translation) && anthropic.total_requests == 0 {
        result.fail_with("total_requests is 0 after requests were sent");
    }
    if saw_passthrough && anthropic.passthrough_requests == 0 {
        result.fail_with("passthrough_requests is 0 but passthrough responses were observed");
    }
    if saw_translation && anthropic.translation_requests == 0 {
        result.fail_with("translation_requests is 0 but translated responses were observed");
    }
    if anthropic.total_fallbacks() > 0 {
        result.note(format!(
            "fallbacks: no_compatible={} no_support={} cannot={}",
            anthropic.fallback_no_compatible_endpoints,
            anthropic.fallback_translator_does_not_support_passthrough,
            anthropic.fallback_cannot_passthrough
        ));
    }

    result
}
