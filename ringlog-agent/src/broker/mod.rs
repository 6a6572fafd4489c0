// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Broker producer abstraction.
//!
//! The agent only needs two things from a broker client: a way to build a
//! producer from the host list, and a non-blocking publish. Errors raised
//! after publish arrive on the connection's error channel, where the agent's
//! observer decides whether the link is lost.

use std::future::Future;

use ringlog_core::BrokerList;
use thiserror::Error;
use tokio::sync::mpsc;

pub mod tcp;
pub mod wire;

pub use tcp::{TcpConnector, TcpProducer};

/// Topic every record is published to.
pub const TOPIC: &str = "ringlog";

/// Partition every record is published to.
pub const PARTITION: i32 = 1;

/// Outbound messages buffered between the agent loop and the network.
pub const CHANNEL_CAPACITY: usize = 1024;

/// One record on its way to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub partition: i32,
    /// Producing module; keeps one module's records together.
    pub key: String,
    /// `identity|message`.
    pub value: String,
}

impl OutboundMessage {
    /// Build the message for a drained record.
    pub fn from_record(identity: &str, module: String, message: &str) -> Self {
        Self {
            topic: TOPIC.to_string(),
            partition: PARTITION,
            key: module,
            value: format!("{}|{}", identity, message),
        }
    }
}

/// Producer failures.
#[derive(Debug, Error)]
pub enum ProducerError {
    #[error("No broker reachable: {reason}")]
    OutOfBrokers { reason: String },

    #[error("Producer client closed")]
    ClientClosed,

    #[error("Producer not connected: {reason}")]
    NotConnected { reason: String },

    #[error("Producer shutting down")]
    ShuttingDown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Outbound channel full - message dropped")]
    ChannelFull,

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ProducerError {
    /// Errors after which the producer is unusable and must be rebuilt.
    pub fn is_connection_fatal(&self) -> bool {
        matches!(
            self,
            Self::OutOfBrokers { .. }
                | Self::ClientClosed
                | Self::NotConnected { .. }
                | Self::ShuttingDown
        )
    }
}

/// A live producer plus the channel its asynchronous errors arrive on.
pub struct Connection<P> {
    pub producer: P,
    pub errors: mpsc::Receiver<ProducerError>,
}

/// Publishing half of a broker client.
pub trait Producer: Send {
    /// Hand `message` to the producer without waiting for delivery.
    fn publish(&mut self, message: OutboundMessage) -> Result<(), ProducerError>;
}

/// Builds producers from a broker host list.
pub trait Connector: Send + Sync {
    type Producer: Producer;

    fn connect(
        &self,
        brokers: &BrokerList,
    ) -> impl Future<Output = Result<Connection<Self::Producer>, ProducerError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ProducerError::OutOfBrokers {
            reason: "x".into()
        }
        .is_connection_fatal());
        assert!(ProducerError::ClientClosed.is_connection_fatal());
        assert!(ProducerError::NotConnected {
            reason: "x".into()
        }
        .is_connection_fatal());
        assert!(ProducerError::ShuttingDown.is_connection_fatal());

        assert!(!ProducerError::ChannelFull.is_connection_fatal());
        assert!(!ProducerError::Protocol("bad".into()).is_connection_fatal());
        assert!(!ProducerError::Io(std::io::Error::other("x")).is_connection_fatal());
    }

    #[test]
    fn test_outbound_message_shape() {
        let msg = OutboundMessage::from_record("host-a", "billing".to_string(), "paid");
        assert_eq!(msg.topic, TOPIC);
        assert_eq!(msg.partition, PARTITION);
        assert_eq!(msg.key, "billing");
        assert_eq!(msg.value, "host-a|paid");
    }
}
