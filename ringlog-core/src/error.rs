// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Custom error types for ringlog.
//!
//! Every failure mode is an explicit enum variant. Buffer-level errors are
//! handled by the immediate caller (retry, drop or poll) and never escalate
//! past the logging boundary into the host application.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for ringlog.
#[derive(Debug, Error)]
pub enum RingLogError {
    // =========================================================================
    // Configuration Errors - fatal to the affected component only
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    #[error("Configuration parse error: {message}")]
    ConfigParse { message: String },

    // =========================================================================
    // Shared Memory Errors - missing platform primitive is fatal, not retried
    // =========================================================================
    #[error("Shared memory segment error: {0}")]
    Segment(#[from] SegmentError),

    // =========================================================================
    // Ring Buffer Errors - always handled by the immediate caller
    // =========================================================================
    #[error("Ring buffer error: {0}")]
    Ring(#[from] RingBufferError),

    // =========================================================================
    // Supervisor Errors - disable the remote path, never the host
    // =========================================================================
    #[error("Supervisor error: {0}")]
    Supervisor(#[from] SupervisorError),

    // =========================================================================
    // System Errors
    // =========================================================================
    #[error("IO error: {context} - {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Hard validation errors for configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required field: {field} in {context}")]
    MissingRequiredField {
        field: &'static str,
        context: String,
    },

    #[error("Invalid field value: {field} = {value} - {reason}")]
    InvalidFieldValue {
        field: &'static str,
        value: String,
        reason: String,
    },

    #[error("Broker host list is empty")]
    EmptyBrokerList,
}

/// Shared memory segment errors.
#[derive(Debug, Error)]
pub enum SegmentError {
    #[error("Failed to create shared memory segment {key:#x}: {reason}")]
    CreateFailed { key: i32, reason: String },

    #[error("Failed to attach shared memory segment {key:#x}: {reason}")]
    AttachFailed { key: i32, reason: String },

    #[error("Segment {key:#x} has {actual} bytes, expected {expected} (capacity/slot size disagree)")]
    SizeMismatch {
        key: i32,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid ring geometry: {reason}")]
    InvalidGeometry { reason: String },
}

/// Ring buffer outcomes other than success.
///
/// `Full`, `Rejected` and `CasExhausted` mean the record was dropped.
/// `Empty` and `CasConflict` are reader-transient and the caller retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingBufferError {
    #[error("Ring buffer full - record dropped")]
    Full,

    #[error("Record rejected: negative retry budget {retry_budget}")]
    Rejected { retry_budget: i32 },

    #[error("Lost too many index races - record dropped")]
    CasExhausted,

    #[error("Ring buffer empty - no record available")]
    Empty,

    #[error("Read index moved concurrently")]
    CasConflict,
}

impl RingBufferError {
    /// Reader-side errors the caller should simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Empty | Self::CasConflict)
    }

    /// Writer-side errors after which the record is gone.
    pub fn is_drop(&self) -> bool {
        matches!(self, Self::Full | Self::Rejected { .. } | Self::CasExhausted)
    }
}

/// Process supervisor errors.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("Agent binary not found: {path} - {reason}")]
    AgentNotFound { path: PathBuf, reason: String },

    #[error("Agent path is a directory: {path}")]
    AgentIsDirectory { path: PathBuf },

    #[error("Agent binary is not executable: {path} (mode {mode:o})")]
    AgentNotExecutable { path: PathBuf, mode: u32 },

    #[error("Waiting on agent process {pid} failed: {source}")]
    WaitFailed {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias using RingLogError.
pub type RingLogResult<T> = Result<T, RingLogError>;
