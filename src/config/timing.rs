//! Timing classifier thresholds

use super::ConfigError;
use serde::{Deserialize, Serialize};

/// Thresholds used by [`crate::timing::classify`].
///
/// The defaults are empirical reference values, not derived limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingThresholds {
    /// Fewer content events than this is a `single_chunk` verdict
    pub min_chunks: usize,
    /// Above this many events a low average delay alone proves streaming
    pub many_chunks: usize,
    /// Average delay ceiling for the many-chunks shortcut
    pub many_chunks_max_avg_secs: f64,
    /// First content later than this is treated as buffering
    pub first_chunk_ceiling_secs: f64,
    /// Any single gap above this is treated as a buffering stall
    pub max_gap_secs: f64,
    /// Quality band: average delay below this is `batched`
    pub batched_below_secs: f64,
    /// Quality band: average delay below this (and at least `batched_below_secs`) is `smooth`
    pub smooth_below_secs: f64,
    /// Quality band: any gap above this is `choppy`
    pub choppy_gap_secs: f64,
}

impl Default for TimingThresholds {
    fn default() -> Self {
        Self {
            min_chunks: 3,
            many_chunks: 10,
            many_chunks_max_avg_secs: 0.5,
            first_chunk_ceiling_secs: 5.0,
            max_gap_secs: 1.0,
            batched_below_secs: 0.01,
            smooth_below_secs: 0.2,
            choppy_gap_secs: 1.0,
        }
    }
}

impl TimingThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &str, message: &str| ConfigError::Validation {
            field: format!("timing.{}", field),
            message: message.to_string(),
        };

        if self.min_chunks < 2 {
            return Err(invalid(
                "min_chunks",
                "at least two events are needed to measure a delay",
            ));
        }
        if self.many_chunks < self.min_chunks {
            return Err(invalid("many_chunks", "must be >= min_chunks"));
        }

        let positive = [
            ("many_chunks_max_avg_secs", self.many_chunks_max_avg_secs),
            ("first_chunk_ceiling_secs", self.first_chunk_ceiling_secs),
            ("max_gap_secs", self.max_gap_secs),
            ("batched_below_secs", self.batched_below_secs),
            ("smooth_below_secs", self.smooth_below_secs),
            ("choppy_gap_secs", self.choppy_gap_secs),
        ];
        for (field, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(invalid(field, "must be a positive number of seconds"));
            }
        }

        if self.batched_below_secs >= self.smooth_below_secs {
            return Err(invalid(
                "batched_below_secs",
                "must be smaller than smooth_below_secs",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        assert!(TimingThresholds::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_bands_rejected() {
        let thresholds = TimingThresholds {
            batched_below_secs: 0.3,
            ..Default::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::Validation { ref field, .. }) if field == "timing.batched_below_secs"
        ));
    }

    #[test]
    fn test_non_positive_threshold_rejected() {
        let thresholds = TimingThresholds {
            max_gap_secs: 0.0,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());

        let thresholds = TimingThresholds {
            first_chunk_ceiling_secs: f64::NAN,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_min_chunks_floor() {
        let thresholds = TimingThresholds {
            min_chunks: 1,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());
    }
}
