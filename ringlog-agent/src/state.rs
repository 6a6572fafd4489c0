// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Broker link state machine.
//!
//! Implements the producer lifecycle: Disconnected → Connecting → Connected,
//! and back to Disconnected on a failed connect or a fatal producer error.
//! Invalid transitions result in `AgentError::InvalidTransition`.

use std::time::Instant;

use crate::error::AgentError;

/// Broker link states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No producer; the next loop iteration builds one.
    Disconnected,

    /// A producer is being built.
    Connecting,

    /// Producer is live and the ring is being drained.
    Connected,
}

impl LinkState {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting => "Connecting",
            Self::Connected => "Connected",
        }
    }

    /// Check if transition to the target state is valid.
    pub fn can_transition_to(&self, target: LinkState) -> bool {
        matches!(
            (self, target),
            (Self::Disconnected, Self::Connecting)
                | (Self::Connecting, Self::Connected)
                | (Self::Connecting, Self::Disconnected)
                | (Self::Connected, Self::Disconnected)
        )
    }
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Tracks the link state and how often and how recently it changed.
#[derive(Debug)]
pub struct LinkStateMachine {
    current_state: LinkState,
    last_transition: Instant,
    transition_count: u64,
    /// Completed connects, including the first.
    connects: u64,
}

impl LinkStateMachine {
    pub fn new() -> Self {
        Self {
            current_state: LinkState::Disconnected,
            last_transition: Instant::now(),
            transition_count: 0,
            connects: 0,
        }
    }

    pub fn state(&self) -> LinkState {
        self.current_state
    }

    pub fn time_in_current_state(&self) -> std::time::Duration {
        self.last_transition.elapsed()
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn connects(&self) -> u64 {
        self.connects
    }

    /// Attempt to transition to a new state.
    pub fn transition_to(&mut self, target: LinkState) -> Result<(), AgentError> {
        if !self.current_state.can_transition_to(target) {
            return Err(AgentError::InvalidTransition {
                from: self.current_state.name(),
                to: target.name(),
            });
        }

        tracing::debug!(
            from = self.current_state.name(),
            to = target.name(),
            "Link state transition"
        );

        if target == LinkState::Connected {
            self.connects += 1;
        }
        self.current_state = target;
        self.last_transition = Instant::now();
        self.transition_count += 1;

        Ok(())
    }

    /// Whether records may be drained.
    pub fn is_connected(&self) -> bool {
        self.current_state == LinkState::Connected
    }
}

impl Default for LinkStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = LinkStateMachine::new();
        assert_eq!(sm.state(), LinkState::Disconnected);
        assert_eq!(sm.transition_count(), 0);
        assert!(!sm.is_connected());
    }

    #[test]
    fn test_connect_cycle() {
        let mut sm = LinkStateMachine::new();
        sm.transition_to(LinkState::Connecting).unwrap();
        sm.transition_to(LinkState::Connected).unwrap();
        assert!(sm.is_connected());
        sm.transition_to(LinkState::Disconnected).unwrap();
        sm.transition_to(LinkState::Connecting).unwrap();
        sm.transition_to(LinkState::Connected).unwrap();
        assert_eq!(sm.connects(), 2);
        assert_eq!(sm.transition_count(), 5);
    }

    #[test]
    fn test_failed_connect_returns_to_disconnected() {
        let mut sm = LinkStateMachine::new();
        sm.transition_to(LinkState::Connecting).unwrap();
        sm.transition_to(LinkState::Disconnected).unwrap();
        assert_eq!(sm.connects(), 0);
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = LinkStateMachine::new();
        assert!(sm.transition_to(LinkState::Connected).is_err());
        assert!(sm.transition_to(LinkState::Disconnected).is_err());

        sm.transition_to(LinkState::Connecting).unwrap();
        assert!(sm.transition_to(LinkState::Connecting).is_err());
    }
}
