//! Decoder and timing classifier properties.

use probe::config::TimingThresholds;
use probe::stream::{decode_timed_lines, Dialect, EventKind};
use probe::timing::{classify, classify_arrivals, DeliveryMode, StreamQuality};
use proptest::prelude::*;
use std::time::Duration;

fn th() -> TimingThresholds {
    TimingThresholds::default()
}

/// Sorted arrival offsets built from a start time and positive gaps.
fn arrivals_strategy(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    (0.0f64..8.0, prop::collection::vec(0.0f64..2.0, 0..max_len)).prop_map(|(start, gaps)| {
        let mut at = start;
        let mut out = vec![start];
        for gap in gaps {
            at += gap;
            out.push(at);
        }
        out
    })
}

fn openai_line(text: &str) -> String {
    format!(
        "data: {}",
        serde_json::json!({"choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

#[test]
fn test_scenario_steady_stream_is_smooth() {
    let verdict = classify_arrivals(&[0.1, 0.15, 0.22, 0.31, 0.40], &th());
    assert_eq!(verdict.mode, DeliveryMode::Streaming);
    assert_eq!(verdict.quality, StreamQuality::Smooth);
    assert!((verdict.evidence.avg_delay - 0.075).abs() < 1e-9);
    assert!((verdict.evidence.max_delay - 0.09).abs() < 1e-9);
}

#[test]
fn test_scenario_two_events_is_single_chunk() {
    let verdict = classify_arrivals(&[0.1, 1.3], &th());
    assert_eq!(verdict.mode, DeliveryMode::SingleChunk);
    assert_eq!(verdict.quality, StreamQuality::SingleChunk);
}

#[test]
fn test_scenario_late_first_chunk_is_standard() {
    let verdict = classify_arrivals(&[6.0, 6.02, 6.05], &th());
    assert_eq!(verdict.mode, DeliveryMode::Standard);
}

#[test]
fn test_three_events_at_fifty_ms_stream() {
    let verdict = classify_arrivals(&[0.05, 0.10, 0.15], &th());
    assert_eq!(verdict.mode, DeliveryMode::Streaming);
}

#[test]
fn test_decoded_stream_classifies_like_arrivals() {
    let lines: Vec<(Duration, String)> = (0..5)
        .map(|i| (Duration::from_millis(100 + 60 * i), openai_line("tok")))
        .chain(std::iter::once((
            Duration::from_millis(500),
            "data: [DONE]".to_string(),
        )))
        .collect();

    let capture = decode_timed_lines(
        Dialect::OpenAiSse,
        lines.iter().map(|(at, l)| (*at, l.as_str())),
    );
    let from_events = classify(&capture.events, &th());
    let from_arrivals = classify_arrivals(&capture.content_arrivals(), &th());

    assert_eq!(from_events, from_arrivals);
    assert_eq!(from_events.mode, DeliveryMode::Streaming);
}

proptest! {
    #[test]
    fn prop_openai_round_trip(texts in prop::collection::vec("[a-zA-Z0-9 ]{1,12}", 0..40)) {
        let mut lines: Vec<String> = texts.iter().map(|t| openai_line(t)).collect();
        lines.push("data: [DONE]".to_string());

        let capture = decode_timed_lines(
            Dialect::OpenAiSse,
            lines
                .iter()
                .enumerate()
                .map(|(i, l)| (Duration::from_millis(i as u64 * 10), l.as_str())),
        );

        prop_assert_eq!(capture.events.len(), texts.len() + 1);
        prop_assert_eq!(capture.content_count(), texts.len());
        let last = capture.events.last().unwrap();
        prop_assert_eq!(last.kind, EventKind::End);
        prop_assert_eq!(last.payload.as_str(), "[DONE]");
        prop_assert_eq!(capture.text(), texts.concat());
    }

    #[test]
    fn prop_classification_is_idempotent(arrivals in arrivals_strategy(30)) {
        let first = classify_arrivals(&arrivals, &th());
        let second = classify_arrivals(&arrivals, &th());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_fewer_than_three_events_is_single_chunk(arrivals in arrivals_strategy(2)) {
        prop_assume!(arrivals.len() < 3);
        let verdict = classify_arrivals(&arrivals, &th());
        prop_assert_eq!(verdict.mode, DeliveryMode::SingleChunk);
        prop_assert_eq!(verdict.quality, StreamQuality::SingleChunk);
    }

    #[test]
    fn prop_large_gap_never_streams_short_lists(
        start in 0.0f64..1.0,
        gap in 1.01f64..4.0,
    ) {
        let arrivals = [start, start + 0.05, start + 0.05 + gap];
        let verdict = classify_arrivals(&arrivals, &th());
        prop_assert_eq!(verdict.mode, DeliveryMode::Standard);
        prop_assert_eq!(verdict.quality, StreamQuality::Choppy);
    }
}
