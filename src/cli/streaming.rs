//! Streaming command handler

use crate::cli::{output, CommandOutput, StreamingArgs};
use crate::config::ProbeConfig;
use crate::suite::{streaming, Harness};

/// Handle `olla-probe streaming`
pub async fn handle_streaming(args: &StreamingArgs, config: ProbeConfig) -> anyhow::Result<CommandOutput> {
    let harness = Harness::new(config)?;
    harness.preflight().await?;

    let model = harness.pick_model(args.source, args.model.as_deref()).await?;
    let outcome = streaming::run(&harness, &model, args.quick).await;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_streaming(&outcome)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}
