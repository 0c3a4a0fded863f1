//! Integration command handler

use crate::cli::{output, CommandOutput, IntegrationArgs};
use crate::config::ProbeConfig;
use crate::suite::integration::{self, IntegrationOptions};
use crate::suite::Harness;

/// Handle `olla-probe integration`
pub async fn handle_integration(
    args: &IntegrationArgs,
    config: ProbeConfig,
) -> anyhow::Result<CommandOutput> {
    let harness = Harness::new(config)?;
    let options = IntegrationOptions {
        skip_streaming: args.skip_streaming,
        skip_anthropic: args.skip_anthropic,
        skip_providers: args.skip_providers,
        seed: args.seed,
    };

    let outcome = integration::run(&harness, &options).await?;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_integration(&outcome)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}
