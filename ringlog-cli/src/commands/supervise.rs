// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! `ringlog supervise` command - Keep the forwarding agent running.
//!
//! Runs the same supervisor a producing process would, but in the
//! foreground, so the agent can be kept alive without an instrumented
//! application.

use ringlog_core::{ConfigError, Supervisor};

pub async fn execute(config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let remote = config.remote.ok_or(ConfigError::MissingRequiredField {
        field: "remote",
        context: config_path.to_string(),
    })?;

    let mut supervisor = Supervisor::from_config(&remote, &config.ring);
    tracing::info!(
        agent = %supervisor.agent_path().display(),
        brokers = %remote.brokers,
        "Starting supervisor"
    );

    // The supervisor blocks on wait(2); keep it off the runtime threads.
    let Err(e) = tokio::task::spawn_blocking(move || supervisor.run()).await?;
    Err(e.into())
}
