// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Agent environment contract.
//!
//! The supervisor starts the agent with the broker list and ring geometry
//! in its environment. Only the broker list is required.

use std::path::PathBuf;
use std::sync::Arc;

use ringlog_core::config::{ENV_BROKERS, ENV_IDENTITY, ENV_TRACE};
use ringlog_core::{BrokerList, ConfigError, RingBuffer, RingConfig};

use crate::error::AgentError;

/// Validated agent settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub brokers: BrokerList,
    /// Throughput trace file, if tracing is enabled.
    pub trace: Option<PathBuf>,
    /// Prefix for every outbound value; distinguishes hosts or containers.
    pub identity: String,
    pub ring: RingConfig,
}

impl AgentConfig {
    /// Read the agent settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let raw_brokers = lookup(ENV_BROKERS).ok_or(ConfigError::MissingRequiredField {
            field: ENV_BROKERS,
            context: "agent environment".to_string(),
        })?;
        let brokers = BrokerList::parse(&raw_brokers)?;

        let trace = lookup(ENV_TRACE)
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);

        let identity = lookup(ENV_IDENTITY)
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| std::process::id().to_string());

        let ring = RingConfig::from_lookup(&lookup)?;

        Ok(Self {
            brokers,
            trace,
            identity,
            ring,
        })
    }

    /// Read the settings and attach the ring they describe.
    ///
    /// Everything that can stop the agent happens here, before the
    /// forwarding loop starts.
    pub fn load_and_attach(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, Arc<RingBuffer>), AgentError> {
        let config = Self::from_lookup(lookup)?;
        let ring = RingBuffer::attach(config.ring.key, config.ring.geometry)?;
        Ok((config, Arc::new(ring)))
    }
}
