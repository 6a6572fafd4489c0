// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ringlog CLI
//!
//! Operator tooling for the host-local ring buffer and its forwarding agent.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

/// Ringlog - cross-process log transport over a shared-memory ring
#[derive(Parser)]
#[command(name = "ringlog")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (RINGLOG_CONFIG inline YAML takes precedence)
    #[arg(short, long, default_value = "ringlog.yaml")]
    pub config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write random log lines into the ring
    Emit {
        /// Delay between lines in milliseconds
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,

        /// Stop after this many lines
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Module name for the emitted records
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Show ring buffer occupancy
    Stats {
        /// Refresh every second
        #[arg(short, long)]
        watch: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        file: String,
    },

    /// Run the agent supervisor in the foreground
    Supervise,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    // Dispatch to command handlers
    match cli.command {
        Commands::Emit {
            interval_ms,
            count,
            module,
        } => commands::emit::execute(&cli.config, interval_ms, count, module).await,
        Commands::Stats { watch } => commands::stats::execute(&cli.config, watch).await,
        Commands::Validate { file } => commands::validate::execute(&file).await,
        Commands::Supervise => commands::supervise::execute(&cli.config).await,
    }
}
