//! Tasklock CLI - run an in-process lock hub and inspect configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tasklock_core::TasklockConfig;

mod commands;

#[derive(Parser)]
#[command(name = "tasklock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run clients against an in-process hub and report the final lock state
    Simulate {
        /// Number of connected clients
        #[arg(short, long, default_value_t = 4)]
        clients: usize,

        /// Number of records the clients edit
        #[arg(short, long, default_value_t = 10)]
        records: u64,

        /// Edit rounds per client
        #[arg(long, default_value_t = 5)]
        rounds: usize,
    },

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    let config = match &cli.config {
        Some(path) => TasklockConfig::from_json_file(path)?,
        None => TasklockConfig::default(),
    };

    match cli.command {
        Commands::Simulate {
            clients,
            records,
            rounds,
        } => {
            commands::simulate::execute(config, clients, records, rounds)?;
        }
        Commands::Config => {
            commands::config::execute(&config)?;
        }
    }

    Ok(())
}
