//! Passthrough command handler

use crate::cli::{output, CommandOutput, PassthroughArgs};
use crate::config::ProbeConfig;
use crate::suite::passthrough::{self, PassthroughOptions};
use crate::suite::Harness;

/// Handle `olla-probe passthrough`
pub async fn handle_passthrough(
    args: &PassthroughArgs,
    config: ProbeConfig,
) -> anyhow::Result<CommandOutput> {
    let harness = Harness::new(config)?;
    let options = PassthroughOptions {
        source: args.selection.source,
        reconcile: args.selection.reconcile_options(false),
        skip_streaming: args.skip_streaming,
        skip_edge_cases: args.skip_edge_cases,
    };

    let outcome = passthrough::run(&harness, &options).await?;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_passthrough(&outcome)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}
