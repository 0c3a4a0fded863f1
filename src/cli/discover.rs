//! Discover command handler

use crate::cli::{output, CommandOutput, DiscoverArgs};
use crate::config::ProbeConfig;
use crate::suite::Harness;

/// Handle `olla-probe discover`
///
/// Succeeds when at least one backend can be tested.
pub async fn handle_discover(args: &DiscoverArgs, config: ProbeConfig) -> anyhow::Result<CommandOutput> {
    let harness = Harness::new(config)?;
    harness.preflight().await?;

    let options = args.selection.reconcile_options(args.include_empty);
    let (snapshot, reconciliation) = harness.discover(args.selection.source, &options).await?;

    let text = if args.json {
        output::format_discovery_json(&snapshot, &reconciliation)
    } else {
        output::format_discovery_table(&snapshot, &reconciliation)
    };
    let success = reconciliation.testable().next().is_some();
    if !success {
        tracing::warn!("no backend has both a model and a known mode");
    }

    Ok(CommandOutput::new(text, success))
}
