//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// EVE Relay - Suricata EVE pub/sub relay to a search index and an alert API
#[derive(Parser, Debug)]
#[command(
    name = "eve-relay",
    author,
    version,
    about = "Suricata EVE relay: broker -> search index + alert API",
    long_about = "Subscribes to Suricata EVE events on a Redis topic, bulk-indexes every \n\
                  event into daily indices, and raises an alert for every detection \n\
                  with resolved asset and severity labels."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "EVE_RELAY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "EVE_RELAY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults if missing
    #[arg(
        short,
        long,
        default_value = "eve-relay.toml",
        env = "EVE_RELAY_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the broker URL from configuration
    #[arg(long, env = "EVE_RELAY_BROKER_URL")]
    pub broker_url: Option<String>,

    /// Override the subscribed topic from configuration
    #[arg(long, env = "EVE_RELAY_TOPIC")]
    pub topic: Option<String>,

    /// Override the number of workers from configuration
    #[arg(long, env = "EVE_RELAY_WORKERS")]
    pub workers: Option<usize>,

    /// Stop after this many seconds (0 = run until signalled)
    #[arg(long, default_value = "0", env = "EVE_RELAY_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without connecting
    #[arg(long)]
    pub dry_run: bool,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "EVE_RELAY_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "eve-relay.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "eve-relay.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the asset table
    #[arg(long)]
    pub assets: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
