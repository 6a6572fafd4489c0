// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! CLI command modules.

use std::path::Path;

use ringlog_core::{ConfigLoader, RingLogResult, TransportConfig};

pub mod emit;
pub mod stats;
pub mod supervise;
pub mod validate;

/// Load the configuration the commands share.
///
/// A missing file is fine when `RINGLOG_CONFIG` carries the YAML inline; an
/// absent file with no inline config falls back to defaults.
pub(crate) fn load_config(config_path: &str) -> RingLogResult<TransportConfig> {
    let path = Path::new(config_path);
    if path.exists() || std::env::var_os(ringlog_core::config::ENV_CONFIG).is_some() {
        ConfigLoader::load(Some(path))
    } else {
        tracing::debug!(config = %config_path, "No configuration file, using defaults");
        ConfigLoader::load_string("")
    }
}
