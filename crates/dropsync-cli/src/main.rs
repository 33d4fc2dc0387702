//! dropsync CLI - Mirror a Dropbox folder into an S3 prefix
//!
//! Provides commands for:
//! - Running a single reconciliation pass
//! - Running passes on an interval until interrupted
//! - Inspecting and validating the effective configuration
//! - Generating shell completions

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod setup;

use commands::completions::CompletionsCommand;
use commands::config::ConfigCommand;
use commands::sync::SyncCommand;
use commands::watch::WatchCommand;
use dropsync_core::config::{Config, LoggingConfig};
use output::{get_formatter, OutputFormat};

#[derive(Debug, Parser)]
#[command(
    name = "dropsync",
    version,
    about = "One-way mirror of a Dropbox folder into an S3 prefix"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Environment file read before the process environment
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one reconciliation pass
    Sync(SyncCommand),
    /// Run reconciliation passes on an interval until interrupted
    Watch(WatchCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Generate shell completions
    Completions(CompletionsCommand),
}

/// Filter directive from the verbosity flags, falling back to the config
fn log_directive<'a>(verbose: u8, quiet: bool, configured: &'a str) -> &'a str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => configured,
        1 => "debug",
        _ => "trace",
    }
}

fn init_tracing(logging: &LoggingConfig, verbose: u8, quiet: bool) {
    let directive = log_directive(verbose, quiet, &logging.level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    if let Commands::Completions(cmd) = &cli.command {
        return cmd.execute();
    }

    let loaded = Config::load_layered(cli.config.as_deref(), Some(&cli.env_file));
    let logging = loaded
        .as_ref()
        .map(|config| config.logging.clone())
        .unwrap_or_default();
    init_tracing(&logging, cli.verbose, cli.quiet);

    let config = loaded?;
    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&config, format).await,
        Commands::Watch(cmd) => cmd.execute(&config, format).await,
        Commands::Config(cmd) => cmd.execute(&config, format),
        Commands::Completions(_) => Ok(()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match run(cli, format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "Command failed");
            get_formatter(format).error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}
