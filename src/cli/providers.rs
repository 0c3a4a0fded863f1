//! Provider routing and provider streaming command handlers

use crate::cli::{output, CommandOutput, ProviderStreamingArgs, ProvidersArgs};
use crate::config::ProbeConfig;
use crate::suite::providers::{
    self, ModelChoice, Provider, RoutingOptions, StreamingOptions, DEFAULT_MAX_MODELS,
};
use crate::suite::Harness;

/// All providers when none were named.
fn selected_providers(requested: &[Provider]) -> Vec<Provider> {
    if requested.is_empty() {
        Provider::ALL.to_vec()
    } else {
        let mut providers = requested.to_vec();
        providers.sort();
        providers.dedup();
        providers
    }
}

/// Handle `olla-probe providers`
pub async fn handle_providers(
    args: &ProvidersArgs,
    config: ProbeConfig,
) -> anyhow::Result<CommandOutput> {
    let harness = Harness::new(config)?;
    let options = RoutingOptions {
        providers: selected_providers(&args.providers),
        max_models: (!args.all).then_some(DEFAULT_MAX_MODELS),
    };

    let outcome = providers::run_routing(&harness, &options).await?;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_provider_routing(&outcome)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}

/// Handle `olla-probe provider-streaming`
///
/// `--max-time` replaces the configured request timeout for this run.
pub async fn handle_provider_streaming(
    args: &ProviderStreamingArgs,
    mut config: ProbeConfig,
) -> anyhow::Result<CommandOutput> {
    config.gateway.timeout_seconds = args.max_time;
    let harness = Harness::new(config)?;

    let models = if !args.models.is_empty() {
        ModelChoice::Explicit(args.models.clone())
    } else if args.sample {
        ModelChoice::Sample
    } else {
        ModelChoice::Preferred
    };
    let options = StreamingOptions {
        providers: selected_providers(&args.providers),
        models,
    };

    let outcome = providers::run_streaming(&harness, &options).await?;

    let text = if args.json {
        output::to_json(&outcome)
    } else {
        output::format_provider_streaming(&outcome, args.analyze)
    };
    Ok(CommandOutput::new(text, outcome.report.all_passed()))
}
