// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Producer-side entry point.
//!
//! A [`RemoteSink`] owns the process's handle on the host ring and, when a
//! remote section is configured, the thread that keeps the forwarding agent
//! alive. [`RingLayer`] plugs the sink into a `tracing` subscriber so that
//! ordinary `tracing` events become ring records.
//!
//! Nothing here ever fails a caller's log statement: ring failures are
//! counted and the record is dropped.

use std::fmt::{self, Write as _};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

use crate::config::TransportConfig;
use crate::error::{ConfigError, RingBufferError, RingLogError, RingLogResult};
use crate::shm::RingBuffer;
use crate::supervisor::Supervisor;
use crate::types::Record;

/// Per-sink delivery counters.
#[derive(Debug, Default)]
pub struct SinkStats {
    sent: AtomicU64,
    dropped_full: AtomicU64,
    dropped_contention: AtomicU64,
    rejected: AtomicU64,
}

/// Copy of [`SinkStats`] at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SinkCounters {
    pub sent: u64,
    pub dropped_full: u64,
    pub dropped_contention: u64,
    pub rejected: u64,
}

impl SinkStats {
    fn record(&self, result: &Result<(), RingBufferError>) {
        let counter = match result {
            Ok(()) => &self.sent,
            Err(RingBufferError::Full) => &self.dropped_full,
            Err(RingBufferError::CasExhausted) => &self.dropped_contention,
            Err(_) => &self.rejected,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SinkCounters {
        SinkCounters {
            sent: self.sent.load(Ordering::Relaxed),
            dropped_full: self.dropped_full.load(Ordering::Relaxed),
            dropped_contention: self.dropped_contention.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Display for SinkCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} dropped_full={} dropped_contention={} rejected={}",
            self.sent, self.dropped_full, self.dropped_contention, self.rejected
        )
    }
}

/// Process-wide handle for shipping log lines to the forwarding agent.
pub struct RemoteSink {
    module: String,
    retry_budget: i32,
    ring: RingBuffer,
    stats: SinkStats,
    /// Cleared when supervision stops; records are then discarded.
    active: Arc<AtomicBool>,
    supervisor: Option<JoinHandle<()>>,
}

impl RemoteSink {
    /// Attach the host ring and start supervising the agent.
    ///
    /// Intended to run once per process. An invalid agent path is logged
    /// and leaves the sink disabled; it is not an error for the caller.
    pub fn init(config: &TransportConfig) -> RingLogResult<Self> {
        let remote = config
            .remote
            .as_ref()
            .ok_or_else(|| ConfigError::MissingRequiredField {
                field: "remote",
                context: "remote sink".to_string(),
            })?;

        let ring = RingBuffer::attach(config.ring.key, config.ring.geometry)?;
        let mut sink = Self::with_ring(config.module.clone(), remote.retry_budget, ring);

        let mut supervisor = Supervisor::from_config(remote, &config.ring);
        if let Err(e) = supervisor.validate_agent() {
            tracing::warn!(error = %e, "Remote logging disabled");
            sink.active.store(false, Ordering::Release);
            return Ok(sink);
        }

        let active = Arc::clone(&sink.active);
        let handle = std::thread::Builder::new()
            .name("ringlog-supervisor".to_string())
            .spawn(move || {
                let Err(e) = supervisor.run();
                tracing::error!(error = %e, "Agent supervision stopped, remote logging disabled");
                active.store(false, Ordering::Release);
            })
            .map_err(|source| RingLogError::Io {
                context: "spawning supervisor thread",
                source,
            })?;
        sink.supervisor = Some(handle);

        Ok(sink)
    }

    /// Wrap an already attached ring. No agent is supervised.
    pub fn with_ring(module: impl Into<String>, retry_budget: i32, ring: RingBuffer) -> Self {
        Self {
            module: module.into(),
            retry_budget,
            ring,
            stats: SinkStats::default(),
            active: Arc::new(AtomicBool::new(true)),
            supervisor: None,
        }
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn ring(&self) -> &RingBuffer {
        &self.ring
    }

    pub fn stats(&self) -> SinkCounters {
        self.stats.snapshot()
    }

    /// Whether records are still being accepted.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Whether this sink started an agent supervisor thread.
    pub fn is_supervising(&self) -> bool {
        self.supervisor
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Queue `message` under this sink's module, dropping it on any failure.
    pub fn send(&self, message: &str) {
        let _ = self.try_send(message);
    }

    /// Queue `message` and report what happened to it.
    pub fn try_send(&self, message: &str) -> Result<(), RingBufferError> {
        self.try_send_as(&self.module, message)
    }

    /// Queue `message` under another module name.
    pub fn send_as(&self, module: &str, message: &str) {
        let _ = self.try_send_as(module, message);
    }

    pub fn try_send_as(&self, module: &str, message: &str) -> Result<(), RingBufferError> {
        if !self.is_active() {
            return Ok(());
        }
        let record = Record::new(module, message).with_retry_budget(self.retry_budget);
        let result = self.ring.write(&record);
        self.stats.record(&result);
        result
    }
}

impl fmt::Debug for RemoteSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteSink")
            .field("module", &self.module)
            .field("retry_budget", &self.retry_budget)
            .field("geometry", &self.ring.geometry())
            .field("active", &self.is_active())
            .finish()
    }
}

/// `tracing` layer that forwards events into a [`RemoteSink`].
///
/// Each event becomes one line:
/// `timestamp|LEVEL|module|target:line|message key=value...`.
/// Events from ringlog's own crates are skipped so the sink never logs
/// about itself.
pub struct RingLayer {
    sink: Arc<RemoteSink>,
}

impl RingLayer {
    pub fn new(sink: Arc<RemoteSink>) -> Self {
        Self { sink }
    }

    /// Render one event the way it is stored in the ring.
    fn render(&self, event: &Event<'_>) -> String {
        let meta = event.metadata();
        let mut fields = FieldCollector::default();
        event.record(&mut fields);

        format!(
            "{}|{}|{}|{}:{}|{}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.6f"),
            meta.level(),
            self.sink.module(),
            meta.target(),
            meta.line().unwrap_or(0),
            fields.finish()
        )
    }
}

/// Crates whose own events must not be fed back into the ring.
const INTERNAL_CRATES: &[&str] = &["ringlog_core", "ringlog_agent"];

fn is_internal_target(target: &str) -> bool {
    INTERNAL_CRATES.iter().any(|name| {
        target
            .strip_prefix(name)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S: Subscriber> Layer<S> for RingLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if is_internal_target(event.metadata().target()) {
            return;
        }
        self.sink.send(&self.render(event));
    }
}

#[derive(Default)]
struct FieldCollector {
    message: String,
    fields: String,
}

impl FieldCollector {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for FieldCollector {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use crate::config::{RemoteConfig, RingConfig};
    use crate::shm::{remove_segment, unique_test_key};
    use crate::types::{BrokerList, RingGeometry, SegmentKey, DEFAULT_RETRY_BUDGET};
    use tempfile::TempDir;
    use tracing_subscriber::prelude::*;

    fn transport_config(key: SegmentKey, agent_path: Option<PathBuf>) -> TransportConfig {
        TransportConfig {
            module: "svc".to_string(),
            ring: RingConfig {
                key,
                geometry: RingGeometry::new(8, 128).unwrap(),
            },
            remote: agent_path.map(|agent_path| RemoteConfig {
                brokers: BrokerList::parse("127.0.0.1:9").unwrap(),
                agent_path,
                retry_budget: DEFAULT_RETRY_BUDGET,
            }),
        }
    }

    fn sink(capacity: u32) -> Arc<RemoteSink> {
        let ring = RingBuffer::anonymous(RingGeometry::new(capacity, 256).unwrap()).unwrap();
        Arc::new(RemoteSink::with_ring("svc", DEFAULT_RETRY_BUDGET, ring))
    }

    #[test]
    fn test_send_counts_outcomes() {
        let sink = sink(3);
        sink.send("one");
        sink.send("two");
        sink.send("three");

        let stats = sink.stats();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.dropped_full, 1);
        assert_eq!(sink.ring().len(), 2);
    }

    #[test]
    fn test_send_as_overrides_module() {
        let sink = sink(4);
        sink.send_as("audit", "checked");
        let entry = sink.ring().read().unwrap();
        assert_eq!(entry.module, "audit");
        assert_eq!(entry.message, "checked");
    }

    #[test]
    fn test_negative_budget_counted_as_rejected() {
        let ring = RingBuffer::anonymous(RingGeometry::new(4, 64).unwrap()).unwrap();
        let sink = RemoteSink::with_ring("svc", -1, ring);
        assert_eq!(
            sink.try_send("x"),
            Err(RingBufferError::Rejected { retry_budget: -1 })
        );
        assert_eq!(sink.stats().rejected, 1);
        assert!(sink.ring().is_empty());
    }

    #[test]
    fn test_init_requires_remote_section() {
        let key = unique_test_key();
        remove_segment(key);

        match RemoteSink::init(&transport_config(key, None)) {
            Err(RingLogError::Config(ConfigError::MissingRequiredField { field, .. })) => {
                assert_eq!(field, "remote")
            }
            Err(e) => panic!("expected missing remote section, got {}", e),
            Ok(_) => panic!("expected missing remote section, got a sink"),
        }

        remove_segment(key);
    }

    #[test]
    fn test_init_with_missing_agent_disables_sink() {
        let key = unique_test_key();
        remove_segment(key);

        let temp_dir = TempDir::new().unwrap();
        let config = transport_config(key, Some(temp_dir.path().join("no-such-agent")));
        let sink = RemoteSink::init(&config).expect("missing agent must not fail the caller");

        assert!(!sink.is_active());
        assert!(!sink.is_supervising());

        sink.send("dropped");
        assert!(sink.ring().is_empty());
        assert_eq!(sink.stats(), SinkCounters::default());

        drop(sink);
        remove_segment(key);
    }

    #[test]
    fn test_init_with_agent_starts_supervisor() {
        let key = unique_test_key();
        remove_segment(key);

        let temp_dir = TempDir::new().unwrap();
        let script = temp_dir.path().join("agent.sh");
        std::fs::write(&script, "#!/bin/sh\nexec sleep 5\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&script, perms).unwrap();

        let sink = RemoteSink::init(&transport_config(key, Some(script))).unwrap();
        assert!(sink.is_active());
        assert!(sink.is_supervising());
        assert_eq!(
            sink.supervisor.as_ref().and_then(|h| h.thread().name()),
            Some("ringlog-supervisor")
        );

        sink.send("hello");
        assert_eq!(sink.stats().sent, 1);
        let entry = sink.ring().read().unwrap();
        assert_eq!(entry.module, "svc");
        assert_eq!(entry.message, "hello");

        drop(sink);
        remove_segment(key);
    }

    #[test]
    fn test_internal_targets() {
        assert!(is_internal_target("ringlog_core"));
        assert!(is_internal_target("ringlog_core::shm"));
        assert!(is_internal_target("ringlog_agent::broker::tcp"));
        assert!(!is_internal_target("ringlogger_app"));
        assert!(!is_internal_target("ringlog_core_ext::io"));
        assert!(!is_internal_target("app::orders"));
    }

    #[test]
    fn test_inactive_sink_discards() {
        let sink = sink(4);
        sink.active.store(false, Ordering::Release);
        assert!(sink.try_send("x").is_ok());
        assert!(sink.ring().is_empty());
        assert_eq!(sink.stats(), SinkCounters::default());
    }

    #[test]
    fn test_layer_renders_events() {
        let sink = sink(8);
        let subscriber = tracing_subscriber::registry().with(RingLayer::new(Arc::clone(&sink)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "app::orders", order = 42, "order placed");
        });

        let entry = sink.ring().read().unwrap();
        assert_eq!(entry.module, "svc");
        let parts: Vec<&str> = entry.message.split('|').collect();
        assert_eq!(parts.len(), 5);
        assert_eq!(parts[1], "INFO");
        assert_eq!(parts[2], "svc");
        assert!(parts[3].starts_with("app::orders:"));
        assert_eq!(parts[4], "order placed order=42");
    }

    #[test]
    fn test_layer_skips_own_targets() {
        let sink = sink(8);
        let subscriber = tracing_subscriber::registry().with(RingLayer::new(Arc::clone(&sink)));

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "ringlog_core::shm", "internal");
            tracing::warn!(target: "ringlogger_app", "external");
        });

        let entry = sink.ring().read().unwrap();
        assert!(entry.message.contains("ringlogger_app:"));
        assert!(sink.ring().is_empty());
    }
}
