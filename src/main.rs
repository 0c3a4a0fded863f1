use clap::Parser;
use probe::cli::{
    discover, handle_completions, handle_config_init, integration, latency,
    load_config_with_overrides, passthrough, providers, streaming, Cli, CommandOutput, Commands,
    ConfigCommands, GlobalArgs,
};

/// Exit code used when the run is interrupted with Ctrl+C.
const EXIT_INTERRUPTED: i32 = 130;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.global.no_color {
        colored::control::set_override(false);
    }

    let result = match cli.command {
        Commands::Config(ConfigCommands::Init(args)) => {
            handle_config_init(&args).map(|msg| Some(CommandOutput::new(msg, true)))
        }
        Commands::Completions(args) => {
            handle_completions(&args);
            Ok(None)
        }
        command => run_probe(&cli.global, command).await,
    };

    match result {
        Ok(Some(output)) => {
            println!("{}", output.text);
            if !output.success {
                std::process::exit(1);
            }
        }
        Ok(None) => {}
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Run a command that talks to the gateway, racing it against Ctrl+C.
async fn run_probe(global: &GlobalArgs, command: Commands) -> anyhow::Result<Option<CommandOutput>> {
    let config = load_config_with_overrides(global)?;
    probe::logging::init_tracing(&config.logging)
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    tracing::debug!(url = %config.gateway.url, "starting probe");

    let run = async move {
        match command {
            Commands::Discover(args) => discover::handle_discover(&args, config).await,
            Commands::Passthrough(args) => passthrough::handle_passthrough(&args, config).await,
            Commands::Streaming(args) => streaming::handle_streaming(&args, config).await,
            Commands::Latency(args) => latency::handle_latency(&args, config).await,
            Commands::Integration(args) => integration::handle_integration(&args, config).await,
            Commands::Providers(args) => providers::handle_providers(&args, config).await,
            Commands::ProviderStreaming(args) => {
                providers::handle_provider_streaming(&args, config).await
            }
            Commands::Config(_) | Commands::Completions(_) => {
                anyhow::bail!("command does not talk to the gateway")
            }
        }
    };

    tokio::select! {
        result = run => result.map(Some),
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Interrupted");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
