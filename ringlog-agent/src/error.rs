// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Agent-level errors.
//!
//! Only configuration and attach failures stop the agent, and only before
//! the forwarding loop starts. Broker and buffer errors are handled inside
//! the loop.

use ringlog_core::{ConfigError, SegmentError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Shared memory segment error: {0}")]
    Segment(#[from] SegmentError),

    #[error("Invalid link state transition: {from} -> {to}")]
    InvalidTransition {
        from: &'static str,
        to: &'static str,
    },
}
