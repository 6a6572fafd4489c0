//! Ringlog Forwarding Agent
//!
//! Drains the host ring buffer and republishes every record to a remote
//! broker. Owns the producer lifecycle: connect, detect fatal producer
//! errors, reconnect with a fixed backoff.

pub mod agent;
pub mod broker;
pub mod config;
pub mod error;
pub mod state;
pub mod trace;

pub use agent::{observe_errors, ForwardingAgent, StepOutcome};
pub use broker::{Connection, Connector, OutboundMessage, Producer, ProducerError};
pub use config::AgentConfig;
pub use error::AgentError;
pub use state::{LinkState, LinkStateMachine};
