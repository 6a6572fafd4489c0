// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Shared memory transport.
//!
//! A System V segment holding a lock-free ring of fixed-size slots. Writer
//! processes append encoded log records; the forwarding agent drains them.

mod codec;
mod layout;
mod ring_buffer;
mod segment;

pub use codec::{LogEntry, SlotCodec};
pub use ring_buffer::{RingBuffer, RingSnapshot};
pub use segment::SharedSegment;

#[cfg(test)]
pub(crate) use segment::{remove_segment, unique_test_key};
