//! chartsync CLI
//!
//! Command-line client that synchronizes a local chart cache with a
//! clinic server.
//!
//! # Commands
//!
//! - `sync` - Run one sync pass against a server
//! - `status` - Show the sync bookkeeping and record counts of a cache

mod commands;
mod http;

use chartsync_engine::SyncPhase;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Offline chart cache sync tools.
#[derive(Parser)]
#[command(name = "chartsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the local cache directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one sync pass
    Sync {
        /// Base URL of the server
        #[arg(short, long)]
        server: String,

        /// Phases to run, comma separated (default: all)
        #[arg(long, value_delimiter = ',')]
        phase: Vec<SyncPhase>,

        /// Run every phase and record the full-sync window
        #[arg(long)]
        full: bool,

        /// Fetch only observations newer than the stored watermark
        #[arg(long)]
        incremental_obs: bool,

        /// Record the full-sync window even for a partial sync
        #[arg(long)]
        record_window: bool,

        /// Chart layout to fetch
        #[arg(long)]
        chart: Option<String>,

        /// Fetch timeout in seconds
        #[arg(long, default_value = "60")]
        timeout: u64,

        /// Encounter fetch timeout in seconds
        #[arg(long, default_value = "180")]
        observations_timeout: u64,

        /// Skip the server reachability probe
        #[arg(long)]
        no_probe: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show sync bookkeeping and record counts
    Status {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Sync {
            server,
            phase,
            full,
            incremental_obs,
            record_window,
            chart,
            timeout,
            observations_timeout,
            no_probe,
            format,
        } => {
            let path = cli.path.ok_or("Cache path required for sync")?;
            let options = commands::sync::SyncOptions {
                server,
                phases: phase,
                full,
                incremental_observations: incremental_obs,
                record_window,
                chart,
                timeout,
                observations_timeout,
                probe: !no_probe,
            };
            commands::sync::run(&path, &options, &format)?;
        }
        Commands::Status { format } => {
            let path = cli.path.ok_or("Cache path required for status")?;
            commands::status::run(&path, &format)?;
        }
        Commands::Version => {
            println!("chartsync CLI v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
