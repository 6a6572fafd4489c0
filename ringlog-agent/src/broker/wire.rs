// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! TCP wire format for outbound messages.
//!
//! # Wire format
//!
//! ```text
//! PER MESSAGE (Agent -> Broker), all integers big-endian:
//!   [2 bytes: topic_len]
//!   [topic_len bytes: topic UTF-8]
//!   [4 bytes: partition, signed]
//!   [4 bytes: key_len]
//!   [key_len bytes: key UTF-8]
//!   [4 bytes: value_len]
//!   [value_len bytes: value UTF-8]
//! ```

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{OutboundMessage, ProducerError};

/// Largest key or value accepted on the wire.
pub const MAX_FIELD_LEN: usize = 16 * 1024 * 1024;

/// Writes one message frame. Does not flush.
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &OutboundMessage,
) -> Result<(), ProducerError> {
    let topic = message.topic.as_bytes();
    if topic.len() > u16::MAX as usize {
        return Err(ProducerError::Protocol(format!(
            "topic too long: {} bytes (max {})",
            topic.len(),
            u16::MAX
        )));
    }
    for (name, field) in [("key", &message.key), ("value", &message.value)] {
        if field.len() > MAX_FIELD_LEN {
            return Err(ProducerError::Protocol(format!(
                "{name} too long: {} bytes (max {MAX_FIELD_LEN})",
                field.len()
            )));
        }
    }

    writer.write_u16(topic.len() as u16).await?;
    writer.write_all(topic).await?;
    writer.write_i32(message.partition).await?;
    writer.write_u32(message.key.len() as u32).await?;
    writer.write_all(message.key.as_bytes()).await?;
    writer.write_u32(message.value.len() as u32).await?;
    writer.write_all(message.value.as_bytes()).await?;
    Ok(())
}

/// Reads one message frame.
///
/// Returns `None` on a clean end of stream before the frame starts.
pub async fn read_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<Option<OutboundMessage>, ProducerError> {
    let topic_len = match reader.read_u16().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let topic = read_string(reader, topic_len, "topic").await?;
    let partition = reader.read_i32().await?;

    let key_len = reader.read_u32().await? as usize;
    let key = read_string(reader, key_len, "key").await?;
    let value_len = reader.read_u32().await? as usize;
    let value = read_string(reader, value_len, "value").await?;

    Ok(Some(OutboundMessage {
        topic,
        partition,
        key,
        value,
    }))
}

async fn read_string<R: AsyncRead + Unpin>(
    reader: &mut R,
    len: usize,
    name: &str,
) -> Result<String, ProducerError> {
    if len > MAX_FIELD_LEN {
        return Err(ProducerError::Protocol(format!(
            "{name} too long: {len} bytes (max {MAX_FIELD_LEN})"
        )));
    }
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    String::from_utf8(buf)
        .map_err(|e| ProducerError::Protocol(format!("invalid UTF-8 {name}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_layout() {
        let message = OutboundMessage {
            topic: "t".to_string(),
            partition: 1,
            key: "k".to_string(),
            value: "h|v".to_string(),
        };
        let mut buf = Vec::new();
        write_message(&mut buf, &message).await.unwrap();

        assert_eq!(
            buf,
            [
                0, 1, b't', // topic
                0, 0, 0, 1, // partition
                0, 0, 0, 1, b'k', // key
                0, 0, 0, 3, b'h', b'|', b'v', // value
            ]
        );

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(read_message(&mut cursor).await.unwrap(), Some(message));
        assert_eq!(read_message(&mut cursor).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_truncated_frame_is_error() {
        let mut cursor = std::io::Cursor::new(vec![0u8, 5, b'a']);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProducerError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_oversized_length_rejected() {
        let mut frame = vec![0u8, 1, b't', 0, 0, 0, 1];
        frame.extend_from_slice(&u32::MAX.to_be_bytes());
        let mut cursor = std::io::Cursor::new(frame);
        assert!(matches!(
            read_message(&mut cursor).await,
            Err(ProducerError::Protocol(_))
        ));
    }
}
