//! Ringlog Core Library
//!
//! Cross-process log transport for a single host. Provides the shared
//! memory segment, the lock-free slot ring and its codec, configuration
//! parsing, forwarding agent supervision, and the producer-side sink.

pub mod config;
pub mod error;
pub mod shm;
pub mod sink;
pub mod supervisor;
pub mod types;

// Re-export commonly used types
pub use config::{ConfigLoader, RemoteConfig, RingConfig, TransportConfig};
pub use error::{
    ConfigError, RingBufferError, RingLogError, RingLogResult, SegmentError, SupervisorError,
};
pub use shm::{LogEntry, RingBuffer, RingSnapshot, SharedSegment, SlotCodec};
pub use sink::{RemoteSink, RingLayer, SinkCounters};
pub use supervisor::Supervisor;
pub use types::{BrokerList, Record, RingGeometry, SegmentKey};
