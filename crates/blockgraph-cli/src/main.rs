//! Blockgraph CLI
//!
//! - `perf relations`: time relation index builds over a synthetic registry
//! - `inspect`: print the relations of a small demo scene

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

use blockgraph_main::RelationsConfig;

mod inspect;
mod perf;
mod synthetic;

#[derive(Parser)]
#[command(name = "blockgraph")]
#[command(author, version, about = "Blockgraph: data-block relation index tools")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// JSON configuration for the relation index.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Performance harnesses.
    Perf {
        #[command(subcommand)]
        command: perf::PerfCommands,
    },

    /// Build a demo scene and print every entry's relations.
    Inspect {
        /// Record UI-only references too.
        #[arg(long)]
        include_ui: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Result<RelationsConfig> {
    let config = match path {
        Some(path) => RelationsConfig::from_path(path)?,
        None => RelationsConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(cli.config.as_ref())?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Commands::Perf { command } => perf::cmd_perf(command, config),
        Commands::Inspect { include_ui } => inspect::cmd_inspect(config, include_ui),
    }
}
