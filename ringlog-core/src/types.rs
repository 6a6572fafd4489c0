// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Newtype wrappers for validated inputs.
//!
//! All types validate their invariants at creation time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SegmentError};

/// Size of the ring header: `u32 writeIndex` + `u32 readIndex`.
pub const RING_HEADER_SIZE: usize = 8;

/// Size of the per-slot header: `u16 moduleLen` + `u16 msgLen`.
pub const SLOT_HEADER_SIZE: usize = 4;

/// Well-known segment key shared by every ringlog process on a host.
pub const DEFAULT_SEGMENT_KEY: i32 = 0x524C_4F47;

/// Default number of slots (one is always kept empty).
pub const DEFAULT_CAPACITY: u32 = 1000;

/// Default slot size in bytes.
pub const DEFAULT_SLOT_SIZE: usize = 2000;

/// Default number of CAS retries a writer gets before dropping a record.
pub const DEFAULT_RETRY_BUDGET: i32 = 1;

/// Numeric identifier of the shared memory segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentKey(i32);

impl SegmentKey {
    pub const fn new(key: i32) -> Self {
        Self(key)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for SegmentKey {
    fn default() -> Self {
        Self(DEFAULT_SEGMENT_KEY)
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Validated ring dimensions.
///
/// Every process attaching to the same segment must agree on both values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingGeometry {
    capacity: u32,
    slot_size: usize,
}

impl RingGeometry {
    /// Create a new geometry.
    ///
    /// `capacity` must be at least 2 (one slot is reserved empty) and
    /// `slot_size` must fit the slot header plus one byte, and no more than
    /// a `u16` length can describe.
    pub fn new(capacity: u32, slot_size: usize) -> Result<Self, SegmentError> {
        if capacity < 2 {
            return Err(SegmentError::InvalidGeometry {
                reason: format!("capacity {} leaves no usable slot (min 2)", capacity),
            });
        }
        if slot_size <= SLOT_HEADER_SIZE || slot_size > u16::MAX as usize {
            return Err(SegmentError::InvalidGeometry {
                reason: format!(
                    "slot size {} out of range ({}..={})",
                    slot_size,
                    SLOT_HEADER_SIZE + 1,
                    u16::MAX
                ),
            });
        }
        let geometry = Self {
            capacity,
            slot_size,
        };
        if geometry.checked_segment_size().is_none() {
            return Err(SegmentError::InvalidGeometry {
                reason: format!("{} slots of {} bytes overflow", capacity, slot_size),
            });
        }
        Ok(geometry)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Number of records the ring can hold at once.
    pub fn usable_capacity(&self) -> u32 {
        self.capacity - 1
    }

    /// Total segment size: header plus all slots.
    pub fn segment_size(&self) -> usize {
        RING_HEADER_SIZE + self.capacity as usize * self.slot_size
    }

    fn checked_segment_size(&self) -> Option<usize> {
        (self.capacity as usize)
            .checked_mul(self.slot_size)?
            .checked_add(RING_HEADER_SIZE)
    }
}

impl Default for RingGeometry {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            slot_size: DEFAULT_SLOT_SIZE,
        }
    }
}

impl fmt::Display for RingGeometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}B", self.capacity, self.slot_size)
    }
}

/// One log record on its way into the ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Short producer name, used as the broker message key.
    pub module: String,
    /// Fully rendered log line.
    pub message: String,
    /// CAS retries allowed before the record is dropped. Negative is rejected.
    pub retry_budget: i32,
}

impl Record {
    pub fn new(module: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            message: message.into(),
            retry_budget: DEFAULT_RETRY_BUDGET,
        }
    }

    pub fn with_retry_budget(mut self, retry_budget: i32) -> Self {
        self.retry_budget = retry_budget;
        self
    }
}

/// Validated, non-empty list of `host:port` broker addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerList(Vec<String>);

impl BrokerList {
    /// Parse a comma-separated list. Blank entries are skipped.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let mut hosts = Vec::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let valid = entry
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p != 0))
                .unwrap_or(false);
            if !valid {
                return Err(ConfigError::InvalidFieldValue {
                    field: "brokers",
                    value: entry.to_string(),
                    reason: "expected host:port".to_string(),
                });
            }
            hosts.push(entry.to_string());
        }

        if hosts.is_empty() {
            return Err(ConfigError::EmptyBrokerList);
        }
        Ok(Self(hosts))
    }

    pub fn hosts(&self) -> &[String] {
        &self.0
    }
}

impl fmt::Display for BrokerList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}
