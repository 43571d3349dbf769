//! hubstatus - advertise Hubs activity as a Discord presence.
//!
//! The CLI wires configuration, logging and a credential source into a
//! gateway client, then feeds it activity read line by line from stdin.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config_bridge;
mod credentials;
mod feed;

use commands::{config, run};

/// hubstatus - Discord presence for Hubs
#[derive(Parser)]
#[command(name = "hubstatus")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to an extra configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect and advertise activity read from stdin
    Run {
        /// Gateway token (overrides config and token file)
        #[arg(long)]
        token: Option<String>,
    },

    /// Print the resolved configuration
    Config {
        /// Only show one section (e.g. "gateway")
        #[arg(long)]
        section: Option<String>,

        /// Print JSON instead of annotated TOML
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let resolved = hubstatus_config::Config::load(cli.config.as_deref());

    // Logging comes up before anything else can fail loudly.
    let log_config = match &resolved {
        Ok(r) => {
            let mut lc = config_bridge::to_log_config(&r.config);
            if cli.verbose {
                "debug".clone_into(&mut lc.level);
            }
            lc
        },
        Err(_) => {
            let level = if cli.verbose { "debug" } else { "info" };
            hubstatus_telemetry::LogConfig::new(level)
        },
    };
    if let Err(e) = hubstatus_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let resolved = resolved?;

    match cli.command {
        Commands::Run { token } => run::run(&resolved.config, token).await?,
        Commands::Config { section, json } => {
            config::show(&resolved, section.as_deref(), json)?;
        },
    }

    Ok(())
}
