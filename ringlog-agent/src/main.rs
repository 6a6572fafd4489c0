// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Ringlog forwarding agent
//!
//! Normally started by a producing process's supervisor with its settings
//! in the environment. Exits with -1 if the broker list or ring settings
//! are missing or invalid; otherwise it never exits on its own.

use clap::Parser;
use ringlog_agent::broker::TcpConnector;
use ringlog_agent::{trace, AgentConfig, ForwardingAgent};
use ringlog_core::config::{
    ENV_BROKERS, ENV_CAPACITY, ENV_IDENTITY, ENV_SHM_KEY, ENV_SLOT_SIZE, ENV_TRACE,
};
use tracing_subscriber::EnvFilter;

/// Ringlog agent - drains the shared ring buffer into a broker
#[derive(Parser)]
#[command(name = "ringlog-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Comma-separated broker host:port list
    #[arg(long, env = ENV_BROKERS)]
    brokers: Option<String>,

    /// Append throughput statistics to this file
    #[arg(long, env = ENV_TRACE)]
    trace: Option<String>,

    /// Identity prefixed to every record (defaults to the pid)
    #[arg(long, env = ENV_IDENTITY)]
    identity: Option<String>,

    /// Shared memory key (decimal or 0x-prefixed hex)
    #[arg(long, env = ENV_SHM_KEY)]
    shm_key: Option<String>,

    /// Ring capacity in slots
    #[arg(long, env = ENV_CAPACITY)]
    capacity: Option<String>,

    /// Slot size in bytes
    #[arg(long, env = ENV_SLOT_SIZE)]
    slot_size: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn lookup(&self, name: &str) -> Option<String> {
        match name {
            ENV_BROKERS => self.brokers.clone(),
            ENV_TRACE => self.trace.clone(),
            ENV_IDENTITY => self.identity.clone(),
            ENV_SHM_KEY => self.shm_key.clone(),
            ENV_CAPACITY => self.capacity.clone(),
            ENV_SLOT_SIZE => self.slot_size.clone(),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();

    let (config, ring) = match AgentConfig::load_and_attach(|name| args.lookup(name)) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!(error = %e, "Agent failed to start");
            eprintln!("ringlog-agent: {}", e);
            std::process::exit(-1);
        }
    };

    let agent = ForwardingAgent::new(TcpConnector::new(), config.brokers, config.identity, ring);

    if let Some(path) = config.trace {
        trace::spawn_trace(path, agent.outbound_counter());
    }

    match agent.run().await {}
}
