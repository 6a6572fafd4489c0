// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Forwarding agent integration tests.
//!
//! The loop is driven one step at a time against a scripted connector with
//! a paused clock, then the TCP producer is checked against a real socket.

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringlog_agent::broker::{wire, TcpConnector, PARTITION, TOPIC};
use ringlog_agent::{
    Connection, Connector, ForwardingAgent, LinkState, OutboundMessage, Producer, ProducerError,
    StepOutcome,
};
use ringlog_core::{BrokerList, Record, RingBuffer, RingGeometry};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Default)]
struct Script {
    /// Connect attempts that fail before one succeeds.
    failures_left: u32,
    attempts: u32,
    published: Vec<OutboundMessage>,
    /// Error senders of every connection handed out, oldest first.
    error_senders: Vec<mpsc::Sender<ProducerError>>,
    /// Error returned by every publish, if set.
    publish_error: Option<fn() -> ProducerError>,
}

#[derive(Clone, Default)]
struct MockConnector {
    script: Arc<Mutex<Script>>,
}

struct MockProducer {
    script: Arc<Mutex<Script>>,
}

impl Producer for MockProducer {
    fn publish(&mut self, message: OutboundMessage) -> Result<(), ProducerError> {
        let mut script = self.script.lock().unwrap();
        if let Some(error) = script.publish_error {
            return Err(error());
        }
        script.published.push(message);
        Ok(())
    }
}

impl Connector for MockConnector {
    type Producer = MockProducer;

    fn connect(
        &self,
        _brokers: &BrokerList,
    ) -> impl Future<Output = Result<Connection<MockProducer>, ProducerError>> + Send {
        let script = Arc::clone(&self.script);
        async move {
            let mut guard = script.lock().unwrap();
            guard.attempts += 1;
            if guard.failures_left > 0 {
                guard.failures_left -= 1;
                return Err(ProducerError::OutOfBrokers {
                    reason: "scripted".to_string(),
                });
            }
            let (tx, rx) = mpsc::channel(8);
            guard.error_senders.push(tx);
            drop(guard);

            Ok(Connection {
                producer: MockProducer { script },
                errors: rx,
            })
        }
    }
}

fn setup() -> (MockConnector, Arc<RingBuffer>, ForwardingAgent<MockConnector>) {
    let connector = MockConnector::default();
    let ring = Arc::new(RingBuffer::anonymous(RingGeometry::new(16, 128).unwrap()).unwrap());
    let agent = ForwardingAgent::new(
        connector.clone(),
        BrokerList::parse("broker:9092").unwrap(),
        "host-a",
        Arc::clone(&ring),
    );
    (connector, ring, agent)
}

fn client_closed() -> ProducerError {
    ProducerError::ClientClosed
}

/// Let spawned tasks (the error observer) run.
async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn test_connects_then_polls_empty_ring() {
    let (connector, _ring, mut agent) = setup();
    assert_eq!(agent.link_state(), LinkState::Disconnected);

    assert_eq!(agent.step().await, StepOutcome::Connected);
    assert_eq!(agent.link_state(), LinkState::Connected);
    assert_eq!(connector.script.lock().unwrap().attempts, 1);

    let start = Instant::now();
    assert_eq!(agent.step().await, StepOutcome::Idle);
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert!(connector.script.lock().unwrap().published.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_forwards_records_keyed_by_module() {
    let (connector, ring, mut agent) = setup();
    ring.write(&Record::new("billing", "invoice 7 paid")).unwrap();
    ring.write(&Record::new("auth", "login ok")).unwrap();

    agent.step().await;
    assert_eq!(agent.step().await, StepOutcome::Forwarded);
    assert_eq!(agent.step().await, StepOutcome::Forwarded);
    assert_eq!(agent.outbound_count(), 2);

    let script = connector.script.lock().unwrap();
    assert_eq!(script.published.len(), 2);
    let first = &script.published[0];
    assert_eq!(first.topic, TOPIC);
    assert_eq!(first.partition, PARTITION);
    assert_eq!(first.key, "billing");
    assert_eq!(first.value, "host-a|invoice 7 paid");
    assert_eq!(script.published[1].key, "auth");
    assert_eq!(script.published[1].value, "host-a|login ok");
}

#[tokio::test(start_paused = true)]
async fn test_not_connected_error_triggers_reconnect() {
    let (connector, ring, mut agent) = setup();
    agent.step().await;
    assert!(agent.is_connected());

    let sender = connector.script.lock().unwrap().error_senders[0].clone();
    sender
        .send(ProducerError::NotConnected {
            reason: "broker went away".to_string(),
        })
        .await
        .unwrap();
    settle().await;
    assert!(!agent.is_connected());

    // A pending record must not be drained while the link is down.
    ring.write(&Record::new("svc", "queued")).unwrap();
    assert_eq!(agent.step().await, StepOutcome::Disconnected);
    assert_eq!(agent.link_state(), LinkState::Disconnected);
    assert_eq!(ring.len(), 1);

    assert_eq!(agent.step().await, StepOutcome::Connected);
    assert_eq!(connector.script.lock().unwrap().attempts, 2);
    assert_eq!(agent.step().await, StepOutcome::Forwarded);
    assert_eq!(agent.link().connects(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_non_fatal_error_keeps_link() {
    let (connector, ring, mut agent) = setup();
    agent.step().await;

    let sender = connector.script.lock().unwrap().error_senders[0].clone();
    sender.send(ProducerError::ChannelFull).await.unwrap();
    settle().await;

    assert!(agent.is_connected());
    ring.write(&Record::new("svc", "still here")).unwrap();
    assert_eq!(agent.step().await, StepOutcome::Forwarded);
    assert_eq!(connector.script.lock().unwrap().attempts, 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_failures_back_off() {
    let (connector, _ring, mut agent) = setup();
    connector.script.lock().unwrap().failures_left = 2;

    let start = Instant::now();
    assert_eq!(agent.step().await, StepOutcome::ConnectFailed);
    assert_eq!(agent.link_state(), LinkState::Disconnected);
    assert_eq!(agent.step().await, StepOutcome::ConnectFailed);
    assert_eq!(agent.step().await, StepOutcome::Connected);

    assert_eq!(start.elapsed(), Duration::from_secs(2));
    assert_eq!(connector.script.lock().unwrap().attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_publish_error_drops_record_and_reconnects() {
    let (connector, ring, mut agent) = setup();
    agent.step().await;

    connector.script.lock().unwrap().publish_error =
        Some(client_closed as fn() -> ProducerError);
    ring.write(&Record::new("svc", "lost")).unwrap();

    assert_eq!(agent.step().await, StepOutcome::Dropped);
    assert_eq!(agent.outbound_count(), 0);
    assert!(ring.is_empty());
    assert_eq!(agent.step().await, StepOutcome::Disconnected);
}

#[tokio::test]
async fn test_tcp_producer_delivers_frames() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let brokers = BrokerList::parse(&format!("127.0.0.1:1,{}", addr)).unwrap();

    let connector = TcpConnector::new().with_connect_timeout(Duration::from_secs(2));
    let mut connection = connector.connect(&brokers).await.unwrap();
    let (mut socket, _) = listener.accept().await.unwrap();

    let sent = OutboundMessage::from_record("host-a", "svc".to_string(), "hello");
    connection.producer.publish(sent.clone()).unwrap();

    let received = tokio::time::timeout(Duration::from_secs(5), wire::read_message(&mut socket))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, Some(sent));
}

#[tokio::test]
async fn test_tcp_peer_close_is_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let brokers = BrokerList::parse(&listener.local_addr().unwrap().to_string()).unwrap();

    let mut connection = TcpConnector::new().connect(&brokers).await.unwrap();
    let (socket, _) = listener.accept().await.unwrap();
    drop(socket);

    let error = tokio::time::timeout(Duration::from_secs(5), connection.errors.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(error.is_connection_fatal());
}

#[tokio::test]
async fn test_tcp_no_reachable_broker() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let brokers = BrokerList::parse(&addr.to_string()).unwrap();
    let result = TcpConnector::new().connect(&brokers).await;
    assert!(matches!(result, Err(ProducerError::OutOfBrokers { .. })));
}
