//! Output formatting helpers for CLI commands

use crate::discovery::Snapshot;
use crate::reconciler::{ExpectedMode, Reconciliation};
use crate::report::{CheckStatus, RunReport};
use crate::suite::integration::IntegrationOutcome;
use crate::suite::latency::LatencyOutcome;
use crate::suite::passthrough::{MatrixRow, PassthroughOutcome};
use crate::suite::providers::{ProviderStreamingOutcome, RoutingOutcome};
use crate::suite::streaming::StreamingOutcome;
use crate::timing::{DeliveryMode, StreamQuality};
use crate::verify::TranslatorStatsResponse;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

/// Serialize any view as pretty JSON.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}

/// Colored PASS/FAIL/SKIP label
pub fn status_label(status: CheckStatus) -> String {
    match status {
        CheckStatus::Pass => status.label().green().to_string(),
        CheckStatus::Fail => status.label().red().to_string(),
        CheckStatus::Skip => status.label().yellow().to_string(),
    }
}

/// Get status icon for a check status
pub fn status_icon(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "✓",
        CheckStatus::Fail => "✗",
        CheckStatus::Skip => "-",
    }
}

fn mode_label(mode: ExpectedMode) -> String {
    match mode {
        ExpectedMode::Passthrough => mode.label().cyan().to_string(),
        ExpectedMode::Translation => mode.label().blue().to_string(),
        ExpectedMode::Untested => mode.label().dimmed().to_string(),
    }
}

fn delivery_label(mode: DeliveryMode) -> String {
    match mode {
        DeliveryMode::Streaming => mode.label().green().to_string(),
        DeliveryMode::Standard => mode.label().yellow().to_string(),
        DeliveryMode::SingleChunk => mode.label().red().to_string(),
    }
}

fn quality_label(quality: StreamQuality) -> String {
    match quality {
        StreamQuality::Smooth => quality.label().green().to_string(),
        StreamQuality::Batched => quality.label().cyan().to_string(),
        StreamQuality::Choppy => quality.label().yellow().to_string(),
        StreamQuality::SingleChunk => quality.label().red().to_string(),
    }
}

fn secs(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.3}s", v))
        .unwrap_or_else(|| "-".to_string())
}

/// Format the reconciled backends as a table
pub fn format_discovery_table(snapshot: &Snapshot, reconciliation: &Reconciliation) -> String {
    let mut table = new_table(vec!["Backend", "Type", "Status", "Models", "Mode", "Test Model"]);

    for b in &reconciliation.backends {
        let model = match &b.selected_model {
            Some(m) if b.selection_is_approximate() => format!("{} (approx)", m).yellow().to_string(),
            Some(m) => m.clone(),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&b.name),
            Cell::new(&b.backend_type),
            Cell::new(&b.status),
            Cell::new(b.models.len()),
            Cell::new(mode_label(b.mode)),
            Cell::new(model),
        ]);
    }

    let mut out = table.to_string();
    out.push_str(&format!(
        "\n{} endpoints, {} models, {} backends",
        snapshot.endpoints.len(),
        snapshot.models.len(),
        reconciliation.backends.len()
    ));
    if !reconciliation.dropped.is_empty() {
        out.push_str(&format!(
            "\nSkipped (unhealthy): {}",
            reconciliation.dropped.join(", ")
        ));
    }
    let approximate = reconciliation.approximate_bindings().count();
    if approximate > 0 {
        out.push_str(&format!(
            "\n{}",
            format!("{} model(s) bound by backend type only", approximate).yellow()
        ));
    }
    out
}

/// Format the reconciled backends as JSON
pub fn format_discovery_json(snapshot: &Snapshot, reconciliation: &Reconciliation) -> String {
    to_json(&json!({
        "endpoints": snapshot.endpoints,
        "models": snapshot.models.len(),
        "backends": reconciliation.backends,
        "dropped": reconciliation.dropped,
        "bindings": reconciliation.bindings,
    }))
}

/// One line per record, grouped by record name prefix.
pub fn format_records(report: &RunReport) -> String {
    let mut out = String::new();
    let mut group = "";
    for record in &report.records {
        if record.group() != group {
            group = record.group();
            out.push_str(&format!("\n{}\n", group.bold()));
        }
        out.push_str(&format!(
            "  {} [{}] {}",
            status_icon(record.status),
            status_label(record.status),
            record.name
        ));
        if !record.detail.is_empty() {
            out.push_str(&format!("  {}", record.detail.dimmed()));
        }
        out.push('\n');
    }
    out
}

pub fn format_summary(report: &RunReport) -> String {
    let total = report.records.len();
    let line = format!(
        "{}: {} passed, {} failed, {} skipped ({} total)",
        report.title,
        report.passed(),
        report.failed(),
        report.skipped(),
        total
    );
    if report.all_passed() {
        line.green().bold().to_string()
    } else {
        line.red().bold().to_string()
    }
}

/// Per-backend results table
pub fn format_matrix_table(rows: &[MatrixRow]) -> String {
    let mut table = new_table(vec![
        "Backend", "Type", "Model", "Mode", "Non-Stream", "Stream", "Result",
    ]);

    for r in rows {
        table.add_row(vec![
            Cell::new(&r.backend),
            Cell::new(&r.backend_type),
            Cell::new(r.model.as_deref().unwrap_or("-")),
            Cell::new(mode_label(r.mode)),
            Cell::new(status_label(r.non_streaming)),
            Cell::new(r.streaming.map(status_label).unwrap_or_else(|| "-".to_string())),
            Cell::new(status_label(r.status())),
        ]);
    }

    table.to_string()
}

pub fn format_stats(stats: &TranslatorStatsResponse) -> String {
    let Some(t) = stats.anthropic() else {
        return "No Anthropic translator stats reported".to_string();
    };
    let mut out = format!(
        "{}: {} requests ({} passthrough, {} translation, {} streaming)",
        t.translator_name.bold(),
        t.total_requests,
        t.passthrough_requests,
        t.translation_requests,
        t.streaming_requests
    );
    if let Some(rate) = &t.passthrough_rate {
        out.push_str(&format!(", passthrough rate {}", rate));
    }
    if t.total_fallbacks() > 0 {
        out.push_str(&format!(
            "\n  fallbacks: no compatible endpoints {}, unsupported {}, cannot passthrough {}",
            t.fallback_no_compatible_endpoints,
            t.fallback_translator_does_not_support_passthrough,
            t.fallback_cannot_passthrough
        ));
    }
    out
}

pub fn format_passthrough(outcome: &PassthroughOutcome) -> String {
    let mut out = format_matrix_table(&outcome.matrix);
    out.push('\n');
    out.push_str(&format_records(&outcome.report));
    if let Some(stats) = &outcome.stats {
        out.push('\n');
        out.push_str(&format_stats(stats));
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&format_summary(&outcome.report));
    out
}

pub fn format_streaming(outcome: &StreamingOutcome) -> String {
    let mut table = new_table(vec![
        "Probe", "Expected", "Detected", "Chunks", "First", "Max Gap", "Total", "Result",
    ]);

    for r in &outcome.results {
        let (detected, chunks, first, max_gap) = match &r.verdict {
            Some(v) => (
                delivery_label(v.mode),
                v.evidence.count.to_string(),
                secs(v.evidence.first_event_time),
                format!("{:.3}s", v.evidence.max_delay),
            ),
            None => (
                r.error.clone().unwrap_or_default().red().to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
            ),
        };
        table.add_row(vec![
            Cell::new(&r.name),
            Cell::new(r.expected.label()),
            Cell::new(detected),
            Cell::new(chunks),
            Cell::new(first),
            Cell::new(max_gap),
            Cell::new(secs(r.total_time)),
            Cell::new(status_label(r.status())),
        ]);
    }

    let mut out = format!("Model: {}\n", outcome.model.bold());
    out.push_str(&table.to_string());
    if let Some(pct) = outcome.streaming_percentage() {
        out.push_str(&format!("\nStreaming working for {:.0}% of streamed probes", pct));
    }
    out.push_str("\n\n");
    out.push_str(&format_summary(&outcome.report));
    out
}

pub fn format_latency(outcome: &LatencyOutcome) -> String {
    let mut table = new_table(vec![
        "#", "Question", "Endpoint", "TTFT", "Chunks", "Avg Gap", "Max Gap", "Quality",
    ]);

    for (i, s) in outcome.samples.iter().enumerate() {
        let quality = match &s.error {
            Some(e) => e.red().to_string(),
            None => quality_label(s.quality),
        };
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&s.question),
            Cell::new(s.endpoint.as_deref().unwrap_or("-")),
            Cell::new(secs(s.ttft)),
            Cell::new(s.chunks),
            Cell::new(format!("{:.3}s", s.evidence.avg_delay)),
            Cell::new(format!("{:.3}s", s.evidence.max_delay)),
            Cell::new(quality),
        ]);
    }

    let summary = &outcome.summary;
    let mut out = format!("Model: {}\n", outcome.model.bold());
    out.push_str(&table.to_string());
    out.push_str(&format!(
        "\nSuccess rate: {:.0}% ({}/{})",
        summary.success_rate(),
        summary.successful,
        summary.total
    ));
    if summary.ttft_avg.is_some() {
        out.push_str(&format!(
            "\nTTFT min {} / avg {} / max {}",
            secs(summary.ttft_min),
            secs(summary.ttft_avg),
            secs(summary.ttft_max)
        ));
    }
    if !summary.quality.is_empty() {
        let bands: Vec<String> = summary
            .quality
            .iter()
            .map(|(q, n)| format!("{} {}", q.label(), n))
            .collect();
        out.push_str(&format!("\nQuality: {}", bands.join(", ")));
    }
    out.push_str("\n\n");
    out.push_str(&format_summary(&outcome.report));
    out
}

pub fn format_integration(outcome: &IntegrationOutcome) -> String {
    let mut out = String::new();
    if let Some(model) = &outcome.selected_model {
        out.push_str(&format!("Model: {}\n", model.bold()));
    }
    for (label, candidate) in [
        ("Passthrough", &outcome.passthrough),
        ("Translation", &outcome.translation),
    ] {
        if let Some(c) = candidate {
            out.push_str(&format!(
                "{}: {} ({}, {})\n",
                label, c.model, c.backend, c.backend_type
            ));
        }
    }
    out.push_str(&format_records(&outcome.report));

    let mut table = new_table(vec!["Phase", "Passed", "Failed", "Skipped"]);
    for (phase, passed, failed, skipped) in outcome.phase_summary() {
        table.add_row(vec![
            Cell::new(phase),
            Cell::new(passed),
            Cell::new(failed),
            Cell::new(skipped),
        ]);
    }
    out.push('\n');
    out.push_str(&table.to_string());
    out.push_str("\n\n");
    out.push_str(&format_summary(&outcome.report));
    out
}

pub fn format_provider_routing(outcome: &RoutingOutcome) -> String {
    let mut out = String::new();
    for (provider, models) in &outcome.provider_models {
        out.push_str(&format!("{}: {} models\n", provider.to_string().bold(), models.len()));
    }
    out.push_str(&format_records(&outcome.report));

    if !outcome.usage.is_empty() {
        let mut table = new_table(vec!["Endpoint", "Total", "Success", "Failed"]);
        for (endpoint, usage) in outcome.usage.iter() {
            let failed = if usage.failure == 0 {
                usage.failure.to_string().dimmed().to_string()
            } else {
                usage.failure.to_string().red().to_string()
            };
            table.add_row(vec![
                Cell::new(endpoint),
                Cell::new(usage.total),
                Cell::new(usage.success),
                Cell::new(failed),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
    }
    if let Some(rate) = outcome.success_rate() {
        out.push_str(&format!("\nSuccess rate: {}%", rate));
    }
    out.push_str("\n\n");
    out.push_str(&format_summary(&outcome.report));
    out
}

/// Provider streaming table; `analyze` adds timing pattern columns.
pub fn format_provider_streaming(outcome: &ProviderStreamingOutcome, analyze: bool) -> String {
    let mut header = vec!["Provider", "Model", "Chunks", "TTFT", "Total", "Tok/s", "Result"];
    if analyze {
        header.extend(["Avg Gap", "Max Gap", "Quality"]);
    }
    let mut table = new_table(header);

    for r in &outcome.results {
        let mut row = vec![
            Cell::new(r.provider),
            Cell::new(&r.model),
            Cell::new(r.chunks),
            Cell::new(secs(r.ttft)),
            Cell::new(secs(r.total_time)),
            Cell::new(format!("{:.1}", r.tokens_per_second)),
            Cell::new(match &r.error {
                Some(e) => e.red().to_string(),
                None => status_label(r.status()),
            }),
        ];
        if analyze {
            row.push(Cell::new(format!("{:.3}s", r.evidence.avg_delay)));
            row.push(Cell::new(format!("{:.3}s", r.evidence.max_delay)));
            row.push(Cell::new(
                r.quality.map(quality_label).unwrap_or_else(|| "-".to_string()),
            ));
        }
        table.add_row(row);
    }

    let mut out = table.to_string();
    for r in &outcome.results {
        for warning in r.warnings() {
            out.push_str(&format!("\n{} {}/{}: {}", "!".yellow(), r.provider, r.model, warning));
        }
    }
    for (provider, (passed, total)) in outcome.per_provider() {
        out.push_str(&format!("\n{}: {}/{} streaming", provider, passed, total));
    }
    if let Some(ttft) = outcome.average_ttft() {
        out.push_str(&format!("\nAvg time to first token: {:.3}s", ttft));
    }
    if let Some(tps) = outcome.average_tokens_per_second() {
        out.push_str(&format!("\nAvg tokens/sec: ~{:.1}", tps));
    }
    out.push_str("\n\n");
    out.push_str(&format_summary(&outcome.report));
    out
}
