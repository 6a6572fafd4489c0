// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Framed TCP producer.
//!
//! Connects to the first reachable broker, then hands messages to a writer
//! task through a bounded channel. A second task watches the read half so
//! that a peer close is reported even while nothing is being sent.

use std::time::Duration;

use ringlog_core::BrokerList;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use super::{wire, Connection, Connector, OutboundMessage, Producer, ProducerError, CHANNEL_CAPACITY};

/// Per-host connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Capacity of the asynchronous error channel.
const ERROR_CHANNEL_CAPACITY: usize = 16;

/// Builds [`TcpProducer`]s.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    connect_timeout: Duration,
    channel_capacity: usize,
}

impl TcpConnector {
    pub fn new() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            channel_capacity: CHANNEL_CAPACITY,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Try each host in order and return the first stream that connects.
    async fn dial(&self, brokers: &BrokerList) -> Result<(TcpStream, String), ProducerError> {
        let mut last_error = String::from("no hosts");

        for host in brokers.hosts() {
            match tokio::time::timeout(self.connect_timeout, TcpStream::connect(host.as_str())).await {
                Ok(Ok(stream)) => {
                    stream.set_nodelay(true)?;
                    return Ok((stream, host.clone()));
                }
                Ok(Err(e)) => {
                    tracing::debug!(host = %host, error = %e, "Broker connect failed");
                    last_error = format!("{}: {}", host, e);
                }
                Err(_) => {
                    tracing::debug!(host = %host, "Broker connect timed out");
                    last_error = format!("{}: connect timed out", host);
                }
            }
        }

        Err(ProducerError::OutOfBrokers { reason: last_error })
    }
}

impl Default for TcpConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for TcpConnector {
    type Producer = TcpProducer;

    async fn connect(&self, brokers: &BrokerList) -> Result<Connection<TcpProducer>, ProducerError> {
        let (stream, peer) = self.dial(brokers).await?;
        let (read_half, write_half) = stream.into_split();

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let (err_tx, err_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let watcher = tokio::spawn(watch_peer(read_half, err_tx.clone()));
        tokio::spawn(write_loop(write_half, rx, err_tx, watcher));

        tracing::info!(broker = %peer, "Connected to broker");
        Ok(Connection {
            producer: TcpProducer { tx, peer },
            errors: err_rx,
        })
    }
}

/// Sending half of a TCP broker connection.
///
/// Dropping the producer closes the channel, which ends the writer task and
/// the connection with it.
#[derive(Debug)]
pub struct TcpProducer {
    tx: mpsc::Sender<OutboundMessage>,
    peer: String,
}

impl TcpProducer {
    pub fn peer(&self) -> &str {
        &self.peer
    }
}

impl Producer for TcpProducer {
    fn publish(&mut self, message: OutboundMessage) -> Result<(), ProducerError> {
        self.tx.try_send(message).map_err(|e| match e {
            TrySendError::Full(_) => ProducerError::ChannelFull,
            TrySendError::Closed(_) => ProducerError::ClientClosed,
        })
    }
}

async fn write_loop(
    write_half: OwnedWriteHalf,
    mut rx: mpsc::Receiver<OutboundMessage>,
    errors: mpsc::Sender<ProducerError>,
    watcher: JoinHandle<()>,
) {
    let mut writer = BufWriter::new(write_half);

    while let Some(message) = rx.recv().await {
        let mut result = wire::write_message(&mut writer, &message).await;
        // Flush once the backlog is drained so bursts share syscalls.
        if result.is_ok() && rx.is_empty() {
            result = writer.flush().await.map_err(ProducerError::from);
        }

        match result {
            Ok(()) => {}
            Err(ProducerError::Io(e)) => {
                let _ = errors
                    .send(ProducerError::NotConnected {
                        reason: e.to_string(),
                    })
                    .await;
                break;
            }
            Err(e) => {
                // Malformed message; the stream itself is still fine.
                let _ = errors.send(e).await;
            }
        }
    }

    watcher.abort();
}

async fn watch_peer(mut read_half: OwnedReadHalf, errors: mpsc::Sender<ProducerError>) {
    let mut buf = [0u8; 512];
    loop {
        match read_half.read(&mut buf).await {
            Ok(0) => {
                let _ = errors.send(ProducerError::ClientClosed).await;
                return;
            }
            Ok(_) => {}
            Err(e) => {
                let _ = errors
                    .send(ProducerError::NotConnected {
                        reason: e.to_string(),
                    })
                    .await;
                return;
            }
        }
    }
}
