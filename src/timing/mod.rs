//! Timing classification of decoded streams
//!
//! Two independent passes run over the arrival offsets of content events:
//!
//! - [`delivery_mode`] is the pass/fail oracle: did the gateway stream tokens
//!   or buffer the whole response?
//! - [`stream_quality`] is descriptive only, used by latency reports.
//!
//! Both are pure functions of the offsets and the thresholds.

use crate::config::TimingThresholds;
use crate::stream::StreamEvent;
use serde::Serialize;
use std::fmt;

/// Streaming-versus-buffering verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    Streaming,
    Standard,
    /// Too few content events to tell
    SingleChunk,
}

impl DeliveryMode {
    pub fn label(&self) -> &'static str {
        match self {
            DeliveryMode::Streaming => "streaming",
            DeliveryMode::Standard => "standard",
            DeliveryMode::SingleChunk => "single_chunk",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Qualitative smoothness band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamQuality {
    Smooth,
    Choppy,
    /// Chunks arrived nearly at once
    Batched,
    SingleChunk,
}

impl StreamQuality {
    pub fn label(&self) -> &'static str {
        match self {
            StreamQuality::Smooth => "smooth",
            StreamQuality::Choppy => "choppy",
            StreamQuality::Batched => "batched",
            StreamQuality::SingleChunk => "single_chunk",
        }
    }
}

impl fmt::Display for StreamQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Numbers a verdict was derived from. Delays are zero with fewer than two events.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TimingEvidence {
    /// Offset of the first content event from request start
    pub first_event_time: Option<f64>,
    pub count: usize,
    pub avg_delay: f64,
    pub max_delay: f64,
    pub min_delay: f64,
}

impl TimingEvidence {
    /// Summarise ordered arrival offsets in seconds.
    pub fn from_arrivals(arrivals: &[f64]) -> Self {
        let delays: Vec<f64> = arrivals.windows(2).map(|w| w[1] - w[0]).collect();

        let (avg_delay, max_delay, min_delay) = if delays.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                delays.iter().sum::<f64>() / delays.len() as f64,
                delays.iter().copied().fold(f64::MIN, f64::max),
                delays.iter().copied().fold(f64::MAX, f64::min),
            )
        };

        Self {
            first_event_time: arrivals.first().copied(),
            count: arrivals.len(),
            avg_delay,
            max_delay,
            min_delay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Verdict {
    pub mode: DeliveryMode,
    pub quality: StreamQuality,
    pub evidence: TimingEvidence,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} chunks, first {}, avg {:.3}s, max {:.3}s)",
            self.mode,
            self.evidence.count,
            self.evidence
                .first_event_time
                .map(|t| format!("{:.3}s", t))
                .unwrap_or_else(|| "-".to_string()),
            self.evidence.avg_delay,
            self.evidence.max_delay,
        )
    }
}

/// Classify decoded events; only content events count.
pub fn classify(events: &[StreamEvent], thresholds: &TimingThresholds) -> Verdict {
    let arrivals: Vec<f64> = events
        .iter()
        .filter(|e| e.is_content())
        .map(StreamEvent::at_secs)
        .collect();
    classify_arrivals(&arrivals, thresholds)
}

/// Classify ordered content arrival offsets in seconds.
pub fn classify_arrivals(arrivals: &[f64], thresholds: &TimingThresholds) -> Verdict {
    let evidence = TimingEvidence::from_arrivals(arrivals);
    Verdict {
        mode: delivery_mode(&evidence, thresholds),
        quality: stream_quality(&evidence, thresholds),
        evidence,
    }
}

/// Streaming-versus-buffering oracle.
pub fn delivery_mode(evidence: &TimingEvidence, th: &TimingThresholds) -> DeliveryMode {
    if evidence.count < th.min_chunks {
        return DeliveryMode::SingleChunk;
    }

    // Many regular chunks prove streaming even behind a slow first token.
    if evidence.count > th.many_chunks && evidence.avg_delay < th.many_chunks_max_avg_secs {
        return DeliveryMode::Streaming;
    }

    if evidence
        .first_event_time
        .is_some_and(|t| t > th.first_chunk_ceiling_secs)
    {
        return DeliveryMode::Standard;
    }

    if evidence.max_delay > th.max_gap_secs {
        return DeliveryMode::Standard;
    }

    DeliveryMode::Streaming
}

/// Smoothness band for latency reporting.
pub fn stream_quality(evidence: &TimingEvidence, th: &TimingThresholds) -> StreamQuality {
    if evidence.count < th.min_chunks {
        StreamQuality::SingleChunk
    } else if evidence.max_delay > th.choppy_gap_secs {
        StreamQuality::Choppy
    } else if evidence.avg_delay < th.batched_below_secs {
        StreamQuality::Batched
    } else if evidence.avg_delay < th.smooth_below_secs {
        StreamQuality::Smooth
    } else {
        StreamQuality::Choppy
    }
}
