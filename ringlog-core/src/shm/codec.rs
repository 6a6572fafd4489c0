// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Slot encoding.
//!
//! A slot holds `[u16 LE moduleLen][u16 LE msgLen][module][message]`.
//! Oversized records lose trailing message bytes; the module is kept whole
//! unless it alone does not fit.

use crate::types::SLOT_HEADER_SIZE;

/// One decoded slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub module: String,
    pub message: String,
}

/// Encoder/decoder for fixed-size ring slots.
pub struct SlotCodec;

impl SlotCodec {
    /// Bytes `encode` would write for this pair into a `slot_size` slot.
    pub fn encoded_len(module: &str, message: &str, slot_size: usize) -> usize {
        (SLOT_HEADER_SIZE + module.len() + message.len()).min(slot_size)
    }

    /// Encode `module` and `message` into `buf`, returning the bytes written.
    ///
    /// If the pair does not fit, `message` is cut to
    /// `buf.len() - 4 - module.len()` bytes. The cut is byte-exact and may
    /// split a UTF-8 sequence; `decode` repairs that lossily.
    pub fn encode(module: &str, message: &str, buf: &mut [u8]) -> usize {
        if buf.len() < SLOT_HEADER_SIZE {
            return 0;
        }
        let room = (buf.len() - SLOT_HEADER_SIZE).min(u16::MAX as usize);

        let module = &module.as_bytes()[..module.len().min(room)];
        let message = &message.as_bytes()[..message.len().min(room - module.len())];

        buf[0..2].copy_from_slice(&(module.len() as u16).to_le_bytes());
        buf[2..4].copy_from_slice(&(message.len() as u16).to_le_bytes());

        let body = SLOT_HEADER_SIZE;
        buf[body..body + module.len()].copy_from_slice(module);
        let tail = body + module.len();
        buf[tail..tail + message.len()].copy_from_slice(message);

        tail + message.len()
    }

    /// Decode a slot.
    ///
    /// Header lengths are clamped to the buffer, so a torn or never-filled
    /// slot decodes to something short instead of reading out of bounds.
    pub fn decode(buf: &[u8]) -> LogEntry {
        if buf.len() < SLOT_HEADER_SIZE {
            return LogEntry {
                module: String::new(),
                message: String::new(),
            };
        }

        let module_len = u16::from_le_bytes([buf[0], buf[1]]) as usize;
        let message_len = u16::from_le_bytes([buf[2], buf[3]]) as usize;

        let body = &buf[SLOT_HEADER_SIZE..];
        let module_len = module_len.min(body.len());
        let message_len = message_len.min(body.len() - module_len);

        let module = &body[..module_len];
        let message = &body[module_len..module_len + message_len];

        LogEntry {
            module: String::from_utf8_lossy(module).into_owned(),
            message: String::from_utf8_lossy(message).into_owned(),
        }
    }
}
