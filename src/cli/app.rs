//! Main CLI application structure

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use super::output::{Output, OutputFormat};
use super::{patch_cmd, target_cmd};

#[derive(Parser)]
#[command(name = "cast")]
#[command(
    author,
    version,
    about = "Grow leveled lists and form lists by cloning the NPCs they reference"
)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default cast.toml
    Init {
        /// Directory to write it to (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Load plugins, grow the configured targets and write the patch
    ///
    /// Examples:
    ///   cast patch Base.jsonl Mod.jsonl
    ///   cast patch Base.jsonl --output out/zPatch.jsonl
    Patch {
        /// Plugin files in load order
        #[arg(required = true)]
        plugins: Vec<PathBuf>,

        /// Config file (defaults to ./cast.toml, then the user config)
        #[arg(long, short, env = "CAST_CONFIG")]
        config: Option<PathBuf>,

        /// Where to write the patch (defaults to next to the last plugin)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// List the configured targets
    Targets {
        #[arg(long, short, env = "CAST_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Edit the configured targets
    #[command(subcommand)]
    Target(target_cmd::TargetCommands),
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    let output = Output::new(cli.format, cli.verbose);

    debug!("cast starting");

    match cli.command {
        Commands::Init { path } => target_cmd::init(&output, &path)?,
        Commands::Patch {
            plugins,
            config,
            output: patch_path,
        } => patch_cmd::run(&output, &plugins, config.as_deref(), patch_path)?,
        Commands::Targets { config } => target_cmd::list(&output, config.as_deref())?,
        Commands::Target(cmd) => target_cmd::run(cmd, &output)?,
    }

    debug!("Command completed successfully");
    Ok(())
}

/// Logs to stderr so stdout stays parseable; `RUST_LOG` overrides the level
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
