// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Typed view over the raw ring bytes.
//!
//! ```text
//! offset 0              u32 LE  writeIndex   (atomic)
//! offset 4              u32 LE  readIndex    (atomic)
//! offset 8 + i*slot     [u8; slot_size]      slot i, 0 <= i < capacity
//! ```
//!
//! The segment is never reinterpreted as a Rust struct. Indices are reached
//! as `AtomicU32` at fixed offsets; slots are only copied in and out.

use std::sync::atomic::AtomicU32;

use crate::error::SegmentError;
use crate::shm::SharedSegment;
use crate::types::{RingGeometry, RING_HEADER_SIZE};

#[cfg(target_endian = "big")]
compile_error!("ringlog stores ring indices little-endian and requires a little-endian target");

const WRITE_INDEX_OFFSET: usize = 0;
const READ_INDEX_OFFSET: usize = 4;

/// Bounds-checked accessor for the ring stored in a [`SharedSegment`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct RingLayout {
    geometry: RingGeometry,
}

impl RingLayout {
    /// Check that `segment` is large and aligned enough for `geometry`.
    pub(crate) fn new(segment: &SharedSegment, geometry: RingGeometry) -> Result<Self, SegmentError> {
        if segment.size() < geometry.segment_size() {
            return Err(SegmentError::InvalidGeometry {
                reason: format!(
                    "segment has {} bytes, ring {} needs {}",
                    segment.size(),
                    geometry,
                    geometry.segment_size()
                ),
            });
        }
        if (segment.as_ptr() as usize) % std::mem::align_of::<AtomicU32>() != 0 {
            return Err(SegmentError::InvalidGeometry {
                reason: "segment base is not 4-byte aligned".to_string(),
            });
        }
        Ok(Self { geometry })
    }

    pub(crate) fn geometry(&self) -> RingGeometry {
        self.geometry
    }

    pub(crate) fn write_index<'a>(&self, segment: &'a SharedSegment) -> &'a AtomicU32 {
        Self::atomic_at(segment, WRITE_INDEX_OFFSET)
    }

    pub(crate) fn read_index<'a>(&self, segment: &'a SharedSegment) -> &'a AtomicU32 {
        Self::atomic_at(segment, READ_INDEX_OFFSET)
    }

    fn atomic_at(segment: &SharedSegment, offset: usize) -> &AtomicU32 {
        debug_assert!(offset + 4 <= RING_HEADER_SIZE);
        // SAFETY: `new` verified the segment covers the header and that the
        // base is 4-byte aligned; both offsets are multiples of 4. The memory
        // lives as long as the borrowed segment and is only ever accessed
        // atomically at these offsets.
        unsafe { &*(segment.as_ptr().add(offset) as *const AtomicU32) }
    }

    /// Byte offset of slot `index`. Out-of-range indices wrap.
    fn slot_offset(&self, index: u32) -> usize {
        let index = index % self.geometry.capacity();
        RING_HEADER_SIZE + index as usize * self.geometry.slot_size()
    }

    /// Copy `bytes` into slot `index`. Extra bytes beyond the slot are ignored.
    ///
    /// Only the holder of the reservation for `index` may call this.
    pub(crate) fn store_slot(&self, segment: &SharedSegment, index: u32, bytes: &[u8]) {
        let len = bytes.len().min(self.geometry.slot_size());
        let offset = self.slot_offset(index);
        // SAFETY: offset + len <= header + capacity * slot_size <= segment size.
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), segment.as_ptr().add(offset), len);
        }
    }

    /// Copy slot `index` into `out`, up to the slot size.
    pub(crate) fn load_slot(&self, segment: &SharedSegment, index: u32, out: &mut [u8]) {
        let len = out.len().min(self.geometry.slot_size());
        let offset = self.slot_offset(index);
        // SAFETY: as in `store_slot`.
        unsafe {
            std::ptr::copy_nonoverlapping(segment.as_ptr().add(offset), out.as_mut_ptr(), len);
        }
    }
}
