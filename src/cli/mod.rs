//! CLI module for olla-probe
//!
//! Command-line interface definitions and handlers.
//!
//! # Commands
//!
//! - `discover` - Show reconciled backends, modes and selected models
//! - `passthrough` - Verify passthrough versus translation mode per backend
//! - `streaming` - Detect whether responses are streamed or buffered
//! - `latency` - Measure time to first token and stream smoothness
//! - `integration` - Walk every gateway route family in phases
//! - `providers` - Route provider-native requests through provider prefixes
//! - `provider-streaming` - Stream through each provider prefix
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Probe a gateway on another host
//! olla-probe --url http://olla.lan:40114 passthrough
//!
//! # Quick streaming check against a specific model
//! olla-probe streaming --model llama3.2:3b --quick
//! ```

pub mod completions;
pub mod config;
pub mod discover;
pub mod integration;
pub mod latency;
pub mod output;
pub mod passthrough;
pub mod providers;
pub mod streaming;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::{ConfigError, ProbeConfig};
use crate::discovery::ModelSource;
use crate::reconciler::{ReconcileOptions, Selection};
use crate::suite::providers::Provider;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// olla-probe - verification harness for the Olla LLM gateway
#[derive(Parser, Debug)]
#[command(
    name = "olla-probe",
    version,
    about = "Verify routing, protocol mode and streaming behaviour of an Olla gateway"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "probe.toml")]
    pub config: PathBuf,

    /// Override gateway base URL
    #[arg(short, long, global = true)]
    pub url: Option<String>,

    /// Override request timeout in seconds
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show reconciled backends and their expected modes
    Discover(DiscoverArgs),
    /// Verify passthrough versus translation mode for every backend
    Passthrough(PassthroughArgs),
    /// Detect streaming versus buffering
    Streaming(StreamingArgs),
    /// Measure streaming latency and smoothness
    Latency(LatencyArgs),
    /// Run the phased end-to-end integration check
    Integration(IntegrationArgs),
    /// Check provider-prefixed model listing and routing
    Providers(ProvidersArgs),
    /// Stream a story prompt through each provider prefix
    ProviderStreaming(ProviderStreamingArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by commands that reconcile backends.
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Model list to reconcile against
    #[arg(long, value_enum, default_value_t = ModelSource::Status)]
    pub source: ModelSource,

    /// Pick each backend's test model at random
    #[arg(long)]
    pub random: bool,

    /// Seed for random model selection
    #[arg(long, requires = "random")]
    pub seed: Option<u64>,
}

impl SelectionArgs {
    pub fn reconcile_options(&self, include_empty: bool) -> ReconcileOptions {
        ReconcileOptions {
            include_empty,
            selection: if self.random {
                Selection::Random { seed: self.seed }
            } else {
                Selection::First
            },
        }
    }
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Also list healthy backends with no models
    #[arg(long)]
    pub include_empty: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct PassthroughArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Skip streaming Anthropic requests
    #[arg(long)]
    pub skip_streaming: bool,

    /// Skip edge case tests
    #[arg(long)]
    pub skip_edge_cases: bool,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Args, Debug)]
pub struct StreamingArgs {
    /// Model to test with (default: phi4:latest, phi3.5:latest or phi3:latest if available)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Run only the first probe
    #[arg(short, long)]
    pub quick: bool,

    /// Model list used for model selection
    #[arg(long, value_enum, default_value_t = ModelSource::Unified)]
    pub source: ModelSource,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct LatencyArgs {
    /// Model to test with (default: phi4:latest, phi3.5:latest or phi3:latest if available)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Questions file, one per line, `#` starts a comment
    #[arg(long, default_value = "questions.txt")]
    pub questions: PathBuf,

    /// Number of questions to ask
    #[arg(short = 'n', long, default_value = "5")]
    pub count: usize,

    /// Seed for question sampling
    #[arg(long)]
    pub seed: Option<u64>,

    /// Model list used for model selection
    #[arg(long, value_enum, default_value_t = ModelSource::Unified)]
    pub source: ModelSource,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct IntegrationArgs {
    /// Skip streaming requests
    #[arg(long)]
    pub skip_streaming: bool,

    /// Skip the Anthropic translator and mode phases
    #[arg(long)]
    pub skip_anthropic: bool,

    /// Skip provider-prefixed model routes
    #[arg(long)]
    pub skip_providers: bool,

    /// Seed for model and backend selection
    #[arg(long)]
    pub seed: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProvidersArgs {
    /// Provider to test (repeatable, default: all)
    #[arg(short, long = "provider", value_enum)]
    pub providers: Vec<Provider>,

    /// Test every model instead of the first three per provider
    #[arg(long)]
    pub all: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct ProviderStreamingArgs {
    /// Provider to test (repeatable, default: all)
    #[arg(short, long = "provider", value_enum)]
    pub providers: Vec<Provider>,

    /// Model to test (repeatable, default: phi models if available)
    #[arg(short, long = "model")]
    pub models: Vec<String>,

    /// Test the first three models per provider, each on one provider
    #[arg(long, conflicts_with = "models")]
    pub sample: bool,

    /// Show timing pattern columns
    #[arg(long)]
    pub analyze: bool,

    /// Maximum seconds per streamed response
    #[arg(long, default_value = "30")]
    pub max_time: u64,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "probe.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Text to print plus whether the run passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub success: bool,
}

impl CommandOutput {
    pub fn new(text: String, success: bool) -> Self {
        Self { text, success }
    }
}

/// Load configuration with file, environment and CLI layers applied.
///
/// A missing file at the default path falls back to defaults.
pub fn load_config_with_overrides(args: &GlobalArgs) -> Result<ProbeConfig, ConfigError> {
    let mut config = if args.config.exists() {
        ProbeConfig::load(Some(&args.config))?
    } else {
        tracing::debug!("Config file not found, using defaults");
        ProbeConfig::default()
    };

    config = config.with_env_overrides();

    if let Some(ref url) = args.url {
        config.gateway.url = url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.gateway.timeout_seconds = timeout;
    }
    if let Some(ref log_level) = args.log_level {
        config.logging.level = log_level.clone();
    }

    config.validate()?;
    Ok(config)
}
