//! Latency command handler

use crate::cli::{output, CommandOutput, LatencyArgs};
use crate::config::ProbeConfig;
use crate::suite::latency::{self, LatencyOptions};
use crate::suite::Harness;
use anyhow::Context;

/// Handle `olla-probe latency`
pub async fn handle_latency(args: &LatencyArgs, config: ProbeConfig) -> anyhow::Result<CommandOutput> {
    let questions = latency::load_questions(&args.questions)
        .with_context(|| format!("reading questions from {}", args.questions.display()))?;

    let harness = Harness::new(config)?;
    harness.preflight().await?;

    let model = harness.pick_model(args.source, args.model.as_deref()).await?;
    let options = LatencyOptions {
        count: args.count,
        questions,
        seed: args.seed,
        ..LatencyOptions::default()
    };
    let outcome = latency::run(&harness, &model, &options).await;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_latency(&outcome)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}
