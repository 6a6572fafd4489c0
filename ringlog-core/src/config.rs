// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! YAML configuration with environment overrides.
//!
//! Raw YAML is parsed first, environment overrides are applied on top, and
//! the result is validated into typed values. Any invalid field is a
//! [`ConfigError`]; callers decide whether that disables the remote path or
//! stops the process.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ConfigError, RingLogError, RingLogResult};
use crate::types::{
    BrokerList, RingGeometry, SegmentKey, DEFAULT_CAPACITY, DEFAULT_RETRY_BUDGET,
    DEFAULT_SEGMENT_KEY, DEFAULT_SLOT_SIZE,
};

/// Inline YAML configuration.
pub const ENV_CONFIG: &str = "RINGLOG_CONFIG";
/// Comma-separated `host:port` broker list handed to the agent.
pub const ENV_BROKERS: &str = "RINGLOG_BROKERS";
/// Override path to the agent executable.
pub const ENV_AGENT_PATH: &str = "RINGLOG_AGENT_PATH";
/// Optional throughput trace file written by the agent.
pub const ENV_TRACE: &str = "RINGLOG_TRACE";
/// Container or host identity prefixed to every forwarded line.
pub const ENV_IDENTITY: &str = "HOSTNAME";
/// Ring geometry, so the agent attaches with the writers' dimensions.
pub const ENV_SHM_KEY: &str = "RINGLOG_SHM_KEY";
pub const ENV_CAPACITY: &str = "RINGLOG_CAPACITY";
pub const ENV_SLOT_SIZE: &str = "RINGLOG_SLOT_SIZE";

/// Install location of the agent when no override is given.
pub const DEFAULT_AGENT_PATH: &str = "/usr/local/bin/ringlog-agent";

/// Raw ring section as parsed from YAML (before validation).
#[derive(Debug, Deserialize)]
struct RawRingConfig {
    #[serde(default = "default_key")]
    key: i32,
    #[serde(default = "default_capacity")]
    capacity: u32,
    #[serde(default = "default_slot_size")]
    slot_size: usize,
}

fn default_key() -> i32 {
    DEFAULT_SEGMENT_KEY
}

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

fn default_slot_size() -> usize {
    DEFAULT_SLOT_SIZE
}

impl Default for RawRingConfig {
    fn default() -> Self {
        Self {
            key: default_key(),
            capacity: default_capacity(),
            slot_size: default_slot_size(),
        }
    }
}

/// Raw remote section.
#[derive(Debug, Deserialize)]
struct RawRemoteConfig {
    #[serde(default)]
    brokers: String,
    #[serde(default)]
    agent_path: Option<String>,
    #[serde(default = "default_retry_budget")]
    retry_budget: i32,
}

fn default_retry_budget() -> i32 {
    DEFAULT_RETRY_BUDGET
}

impl Default for RawRemoteConfig {
    fn default() -> Self {
        Self {
            brokers: String::new(),
            agent_path: None,
            retry_budget: default_retry_budget(),
        }
    }
}

/// Raw root configuration.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    module: Option<String>,
    #[serde(default)]
    ring: RawRingConfig,
    #[serde(default)]
    remote: Option<RawRemoteConfig>,
}

/// Validated ring location and dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingConfig {
    pub key: SegmentKey,
    pub geometry: RingGeometry,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            key: SegmentKey::default(),
            geometry: RingGeometry::default(),
        }
    }
}

impl RingConfig {
    /// Read ring overrides from the environment, defaulting missing values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let key = match lookup(ENV_SHM_KEY) {
            Some(raw) => parse_key(&raw)?,
            None => DEFAULT_SEGMENT_KEY,
        };
        let capacity = match lookup(ENV_CAPACITY) {
            Some(raw) => parse_number::<u32>(ENV_CAPACITY, &raw)?,
            None => DEFAULT_CAPACITY,
        };
        let slot_size = match lookup(ENV_SLOT_SIZE) {
            Some(raw) => parse_number::<usize>(ENV_SLOT_SIZE, &raw)?,
            None => DEFAULT_SLOT_SIZE,
        };
        Self::validate(RawRingConfig {
            key,
            capacity,
            slot_size,
        })
    }

    /// Environment entries that let a child process attach the same ring.
    pub fn to_env(&self) -> Vec<(&'static str, String)> {
        vec![
            (ENV_SHM_KEY, self.key.value().to_string()),
            (ENV_CAPACITY, self.geometry.capacity().to_string()),
            (ENV_SLOT_SIZE, self.geometry.slot_size().to_string()),
        ]
    }

    fn validate(raw: RawRingConfig) -> Result<Self, ConfigError> {
        let geometry = RingGeometry::new(raw.capacity, raw.slot_size).map_err(|e| {
            ConfigError::InvalidFieldValue {
                field: "ring",
                value: format!("capacity={} slot_size={}", raw.capacity, raw.slot_size),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            key: SegmentKey::new(raw.key),
            geometry,
        })
    }
}

/// Validated remote logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub brokers: BrokerList,
    pub agent_path: PathBuf,
    pub retry_budget: i32,
}

/// Complete validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Module name attached to every record from this process.
    pub module: String,
    pub ring: RingConfig,
    /// `None` disables the remote path.
    pub remote: Option<RemoteConfig>,
}

/// Configuration loader with strict validation.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load from `RINGLOG_CONFIG` if set, otherwise from `path`.
    pub fn load(path: Option<&Path>) -> RingLogResult<TransportConfig> {
        if let Ok(inline) = std::env::var(ENV_CONFIG) {
            if !inline.trim().is_empty() {
                return Self::load_string(&inline);
            }
        }

        match path {
            Some(path) => Self::load_file(path),
            None => Err(RingLogError::ConfigParse {
                message: format!("no configuration: set {} or pass a file", ENV_CONFIG),
            }),
        }
    }

    /// Load and validate configuration from a YAML file.
    pub fn load_file(path: impl AsRef<Path>) -> RingLogResult<TransportConfig> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RingLogError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| RingLogError::Io {
            context: "reading config file",
            source: e,
        })?;

        Self::load_string(&content)
    }

    /// Load and validate a YAML string, applying process environment overrides.
    pub fn load_string(content: &str) -> RingLogResult<TransportConfig> {
        Self::load_string_with(content, |name| std::env::var(name).ok())
    }

    /// Load and validate a YAML string with an explicit override source.
    pub fn load_string_with(
        content: &str,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> RingLogResult<TransportConfig> {
        let mut raw: RawConfig = if content.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| RingLogError::ConfigParse {
                message: format!("YAML parse error: {}", e),
            })?
        };

        Self::apply_overrides(&mut raw, lookup);
        Ok(Self::validate(raw)?)
    }

    fn apply_overrides(raw: &mut RawConfig, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(brokers) = lookup(ENV_BROKERS) {
            raw.remote.get_or_insert_with(Default::default).brokers = brokers;
        }
        if let Some(path) = lookup(ENV_AGENT_PATH) {
            if let Some(remote) = raw.remote.as_mut() {
                remote.agent_path = Some(path);
            }
        }
    }

    fn validate(raw: RawConfig) -> Result<TransportConfig, ConfigError> {
        let ring = RingConfig::validate(raw.ring)?;

        let module = match raw.module {
            Some(module) if !module.trim().is_empty() => module,
            _ => default_module(),
        };

        let remote = match raw.remote {
            Some(remote) => Some(Self::validate_remote(remote)?),
            None => None,
        };

        Ok(TransportConfig {
            module,
            ring,
            remote,
        })
    }

    fn validate_remote(raw: RawRemoteConfig) -> Result<RemoteConfig, ConfigError> {
        if raw.brokers.trim().is_empty() {
            return Err(ConfigError::MissingRequiredField {
                field: "brokers",
                context: "remote".to_string(),
            });
        }
        let brokers = BrokerList::parse(&raw.brokers)?;

        if raw.retry_budget < 0 {
            return Err(ConfigError::InvalidFieldValue {
                field: "retry_budget",
                value: raw.retry_budget.to_string(),
                reason: "must be zero or positive".to_string(),
            });
        }

        let agent_path = raw
            .agent_path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_AGENT_PATH));

        Ok(RemoteConfig {
            brokers,
            agent_path,
            retry_budget: raw.retry_budget,
        })
    }
}

/// The executable's file name, used when no module is configured.
pub fn default_module() -> String {
    std::env::args_os()
        .next()
        .as_deref()
        .and_then(|arg0| Path::new(arg0).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "ringlog".to_string())
}

fn parse_key(raw: &str) -> Result<i32, ConfigError> {
    let trimmed = raw.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map(|v| v as i32).ok(),
        None => trimmed.parse::<i32>().ok(),
    };
    parsed.ok_or_else(|| ConfigError::InvalidFieldValue {
        field: "shm_key",
        value: raw.to_string(),
        reason: "expected a decimal or 0x-prefixed hex integer".to_string(),
    })
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidFieldValue {
            field,
            value: raw.to_string(),
            reason: "expected a non-negative integer".to_string(),
        })
}
