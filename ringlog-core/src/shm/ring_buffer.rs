// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Lock-free circular ring buffer of fixed-size slots.
//!
//! Many writer processes, one reader process. Writers reserve a slot by
//! advancing `writeIndex` with compare-and-swap and then fill it; the reader
//! copies the slot at `readIndex` out and advances `readIndex` the same way.
//! One slot always stays empty, so `writeIndex == readIndex` means empty and
//! `writeIndex + 1 == readIndex` (mod N) means full.
//!
//! Reservation and fill are separate steps, so `writeIndex` can move past a
//! slot before its bytes land. A writer that dies in between leaves a zeroed
//! or stale slot behind for good. A live writer leaves the same window open
//! briefly: a reader that gets there first copies the old contents, and the
//! late fill lands in a slot that is already free. The reader decodes
//! whatever is there.

use std::sync::atomic::Ordering;

use crate::error::{RingBufferError, SegmentError};
use crate::shm::codec::{LogEntry, SlotCodec};
use crate::shm::layout::RingLayout;
use crate::shm::SharedSegment;
use crate::types::{Record, RingGeometry, SegmentKey};

/// Point-in-time view of the ring indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSnapshot {
    pub write_index: u32,
    pub read_index: u32,
    /// Records currently buffered.
    pub len: u32,
}

/// Fixed-capacity multi-producer ring of log records in shared memory.
pub struct RingBuffer {
    segment: SharedSegment,
    layout: RingLayout,
}

impl RingBuffer {
    /// Create or attach the host-wide ring identified by `key`.
    pub fn attach(key: SegmentKey, geometry: RingGeometry) -> Result<Self, SegmentError> {
        let segment = SharedSegment::create_or_attach(key, geometry.segment_size())?;
        let ring = Self::from_segment(segment, geometry)?;

        tracing::info!(
            key = %key,
            geometry = %geometry,
            created = ring.segment.created(),
            "Ring buffer attached"
        );
        Ok(ring)
    }

    /// Create a ring in a fresh anonymous mapping.
    pub fn anonymous(geometry: RingGeometry) -> Result<Self, SegmentError> {
        let segment = SharedSegment::anonymous(geometry.segment_size())?;
        Self::from_segment(segment, geometry)
    }

    /// Lay a ring over an existing segment without touching its contents.
    pub fn from_segment(
        segment: SharedSegment,
        geometry: RingGeometry,
    ) -> Result<Self, SegmentError> {
        let layout = RingLayout::new(&segment, geometry)?;
        Ok(Self { segment, layout })
    }

    pub fn geometry(&self) -> RingGeometry {
        self.layout.geometry()
    }

    /// Records the ring can hold at once (`capacity - 1`).
    pub fn usable_capacity(&self) -> u32 {
        self.geometry().usable_capacity()
    }

    /// Append a record without blocking.
    ///
    /// Fails with `Rejected` for a negative retry budget, `Full` when no slot
    /// is free, and `CasExhausted` once the record has lost more index races
    /// than its budget allows. In every failure case the record is dropped
    /// and `writeIndex` is left as other writers made it.
    pub fn write(&self, record: &Record) -> Result<(), RingBufferError> {
        if record.retry_budget < 0 {
            return Err(RingBufferError::Rejected {
                retry_budget: record.retry_budget,
            });
        }

        let slot = self.reserve(record.retry_budget)?;

        let mut buf = vec![0u8; self.geometry().slot_size()];
        let len = SlotCodec::encode(&record.module, &record.message, &mut buf);
        self.layout.store_slot(&self.segment, slot, &buf[..len]);
        Ok(())
    }

    /// Claim the next free slot, retrying lost races up to `retry_budget` times.
    fn reserve(&self, mut retry_budget: i32) -> Result<u32, RingBufferError> {
        let capacity = self.geometry().capacity();
        let write_index = self.layout.write_index(&self.segment);
        let read_index = self.layout.read_index(&self.segment);

        loop {
            let write = write_index.load(Ordering::Acquire);
            let read = read_index.load(Ordering::Acquire);
            let next = (write % capacity + 1) % capacity;

            if next == read {
                tracing::trace!(write = write, read = read, "Ring full, dropping record");
                return Err(RingBufferError::Full);
            }

            match write_index.compare_exchange(write, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return Ok(write % capacity),
                Err(_) if retry_budget <= 0 => {
                    tracing::trace!(write = write, "Retry budget spent, dropping record");
                    return Err(RingBufferError::CasExhausted);
                }
                Err(_) => retry_budget -= 1,
            }
        }
    }

    /// Take the oldest record without blocking.
    ///
    /// Returns `Empty` when there is nothing to read and `CasConflict` when
    /// another reader advanced `readIndex` first; both are for the caller to
    /// retry. The slot is copied out before `readIndex` moves, so writers
    /// can't reuse it mid-copy.
    pub fn read(&self) -> Result<LogEntry, RingBufferError> {
        let capacity = self.geometry().capacity();
        let write_index = self.layout.write_index(&self.segment);
        let read_index = self.layout.read_index(&self.segment);

        let read = read_index.load(Ordering::Acquire);
        let write = write_index.load(Ordering::Acquire);
        if read == write {
            return Err(RingBufferError::Empty);
        }

        let mut buf = vec![0u8; self.geometry().slot_size()];
        self.layout.load_slot(&self.segment, read, &mut buf);

        let next = (read % capacity + 1) % capacity;
        read_index
            .compare_exchange(read, next, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RingBufferError::CasConflict)?;

        Ok(SlotCodec::decode(&buf))
    }

    /// Current indices and fill level.
    pub fn snapshot(&self) -> RingSnapshot {
        let capacity = self.geometry().capacity();
        let write_index = self.layout.write_index(&self.segment).load(Ordering::Acquire);
        let read_index = self.layout.read_index(&self.segment).load(Ordering::Acquire);
        let len = (write_index % capacity + capacity - read_index % capacity) % capacity;
        RingSnapshot {
            write_index,
            read_index,
            len,
        }
    }

    /// Number of records currently buffered.
    pub fn len(&self) -> u32 {
        self.snapshot().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() == self.usable_capacity()
    }

    /// The segment backing this ring.
    pub fn segment(&self) -> &SharedSegment {
        &self.segment
    }
}
