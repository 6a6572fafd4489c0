// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! The forwarding loop.
//!
//! One logical loop owns the producer. While disconnected it builds a new
//! producer, sleeping a fixed second after each failure. While connected it
//! drains the ring: `Empty` sleeps 100ms, `CasConflict` retries at once, and
//! every record is published keyed by its module with the agent identity in
//! front of the message.
//!
//! A separate observer task reads the producer's error channel and clears
//! the shared `connected` flag on connection-fatal errors. The loop notices
//! on its next iteration and drops the producer.

use std::convert::Infallible;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ringlog_core::{BrokerList, RingBuffer, RingBufferError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::broker::{Connector, OutboundMessage, Producer, ProducerError};
use crate::state::{LinkState, LinkStateMachine};

/// Delay after a failed connect.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Delay after finding the ring empty.
pub const POLL_DELAY: Duration = Duration::from_millis(100);

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A producer was built.
    Connected,
    /// Connecting failed; the backoff delay has elapsed.
    ConnectFailed,
    /// The observer reported a lost link; the producer was dropped.
    Disconnected,
    /// The ring was empty; the poll delay has elapsed.
    Idle,
    /// Another reader moved the read index first.
    Conflict,
    /// One record was handed to the producer.
    Forwarded,
    /// One record was read but the producer refused it.
    Dropped,
}

/// Drains a ring buffer into a broker producer.
pub struct ForwardingAgent<C: Connector> {
    connector: C,
    brokers: BrokerList,
    /// Prefixed to every outbound value.
    identity: String,
    ring: Arc<RingBuffer>,
    producer: Option<C::Producer>,
    connected: Arc<AtomicBool>,
    link: LinkStateMachine,
    outbound: Arc<AtomicU64>,
    observer: Option<JoinHandle<()>>,
}

impl<C: Connector> ForwardingAgent<C> {
    pub fn new(
        connector: C,
        brokers: BrokerList,
        identity: impl Into<String>,
        ring: Arc<RingBuffer>,
    ) -> Self {
        Self {
            connector,
            brokers,
            identity: identity.into(),
            ring,
            producer: None,
            connected: Arc::new(AtomicBool::new(false)),
            link: LinkStateMachine::new(),
            outbound: Arc::new(AtomicU64::new(0)),
            observer: None,
        }
    }

    pub fn link_state(&self) -> LinkState {
        self.link.state()
    }

    pub fn link(&self) -> &LinkStateMachine {
        &self.link
    }

    /// Whether the observer currently considers the producer usable.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Records handed to a producer so far.
    pub fn outbound_count(&self) -> u64 {
        self.outbound.load(Ordering::Relaxed)
    }

    /// Shared handle on the outbound counter, for the trace task.
    pub fn outbound_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.outbound)
    }

    /// Forward forever.
    pub async fn run(mut self) -> Infallible {
        tracing::info!(
            brokers = %self.brokers,
            identity = %self.identity,
            geometry = %self.ring.geometry(),
            "Forwarding agent running"
        );
        loop {
            self.step().await;
        }
    }

    /// Run one loop iteration.
    pub async fn step(&mut self) -> StepOutcome {
        match self.link.state() {
            LinkState::Connected if self.is_connected() && self.producer.is_some() => {
                self.drain_one().await
            }
            LinkState::Connected => {
                self.disconnect();
                StepOutcome::Disconnected
            }
            LinkState::Disconnected | LinkState::Connecting => self.reconnect().await,
        }
    }

    async fn reconnect(&mut self) -> StepOutcome {
        if self.link.state() == LinkState::Disconnected {
            self.set_link(LinkState::Connecting);
        }

        match self.connector.connect(&self.brokers).await {
            Ok(connection) => {
                self.producer = Some(connection.producer);
                self.connected.store(true, Ordering::Release);
                self.observer = Some(tokio::spawn(observe_errors(
                    connection.errors,
                    Arc::clone(&self.connected),
                )));
                self.set_link(LinkState::Connected);
                tracing::info!(connects = self.link.connects(), "Producer connected");
                StepOutcome::Connected
            }
            Err(e) => {
                tracing::warn!(
                    brokers = %self.brokers,
                    error = %e,
                    retry_in_ms = RECONNECT_DELAY.as_millis() as u64,
                    "Failed to build producer"
                );
                self.set_link(LinkState::Disconnected);
                tokio::time::sleep(RECONNECT_DELAY).await;
                StepOutcome::ConnectFailed
            }
        }
    }

    fn disconnect(&mut self) {
        tracing::warn!("Broker link lost, reconnecting");
        self.producer = None;
        self.connected.store(false, Ordering::Release);
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
        self.set_link(LinkState::Disconnected);
    }

    async fn drain_one(&mut self) -> StepOutcome {
        let entry = match self.ring.read() {
            Ok(entry) => entry,
            Err(RingBufferError::Empty) => {
                tokio::time::sleep(POLL_DELAY).await;
                return StepOutcome::Idle;
            }
            Err(RingBufferError::CasConflict) => return StepOutcome::Conflict,
            Err(e) => {
                tracing::warn!(error = %e, "Unexpected ring read error");
                tokio::time::sleep(POLL_DELAY).await;
                return StepOutcome::Idle;
            }
        };

        let message = OutboundMessage::from_record(&self.identity, entry.module, &entry.message);
        let Some(producer) = self.producer.as_mut() else {
            return StepOutcome::Dropped;
        };

        match producer.publish(message) {
            Ok(()) => {
                self.outbound.fetch_add(1, Ordering::Relaxed);
                StepOutcome::Forwarded
            }
            Err(e) => {
                if e.is_connection_fatal() {
                    self.connected.store(false, Ordering::Release);
                }
                tracing::debug!(error = %e, "Record dropped by producer");
                StepOutcome::Dropped
            }
        }
    }

    fn set_link(&mut self, target: LinkState) {
        if let Err(e) = self.link.transition_to(target) {
            tracing::error!(error = %e, "Link state out of sync");
        }
    }
}

impl<C: Connector> Drop for ForwardingAgent<C> {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.take() {
            observer.abort();
        }
    }
}

/// Watch a producer's error channel until it closes.
///
/// Connection-fatal errors clear `connected`; anything else is only logged.
pub async fn observe_errors(
    mut errors: mpsc::Receiver<ProducerError>,
    connected: Arc<AtomicBool>,
) {
    while let Some(e) = errors.recv().await {
        if e.is_connection_fatal() {
            tracing::warn!(error = %e, "Producer connection lost");
            connected.store(false, Ordering::Release);
        } else {
            tracing::warn!(error = %e, "Producer error");
        }
    }
}
