//! Events emitted by circuit breakers.

use crate::state::CircuitState;
use std::time::Instant;
use taskguard_core::events::PolicyEvent;

/// Events emitted during the breaker lifecycle.
#[derive(Debug, Clone)]
pub enum CircuitBreakerEvent {
    /// The breaker moved between states.
    StateTransition {
        /// Dependency name the breaker tracks.
        breaker_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State before the transition.
        from_state: CircuitState,
        /// State after the transition.
        to_state: CircuitState,
    },
    /// A call was allowed through.
    CallPermitted {
        /// Dependency name the breaker tracks.
        breaker_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State in which the call was permitted.
        state: CircuitState,
    },
    /// A call was rejected because the circuit is open (or probes are full).
    CallRejected {
        /// Dependency name the breaker tracks.
        breaker_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A success was recorded.
    SuccessRecorded {
        /// Dependency name the breaker tracks.
        breaker_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State in which the result was recorded.
        state: CircuitState,
    },
    /// A failure was recorded.
    FailureRecorded {
        /// Dependency name the breaker tracks.
        breaker_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// State in which the result was recorded.
        state: CircuitState,
    },
}

impl PolicyEvent for CircuitBreakerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CircuitBreakerEvent::StateTransition { .. } => "state_transition",
            CircuitBreakerEvent::CallPermitted { .. } => "call_permitted",
            CircuitBreakerEvent::CallRejected { .. } => "call_rejected",
            CircuitBreakerEvent::SuccessRecorded { .. } => "success_recorded",
            CircuitBreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CircuitBreakerEvent::StateTransition { timestamp, .. }
            | CircuitBreakerEvent::CallPermitted { timestamp, .. }
            | CircuitBreakerEvent::CallRejected { timestamp, .. }
            | CircuitBreakerEvent::SuccessRecorded { timestamp, .. }
            | CircuitBreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            CircuitBreakerEvent::StateTransition { breaker_name, .. }
            | CircuitBreakerEvent::CallPermitted { breaker_name, .. }
            | CircuitBreakerEvent::CallRejected { breaker_name, .. }
            | CircuitBreakerEvent::SuccessRecorded { breaker_name, .. }
            | CircuitBreakerEvent::FailureRecorded { breaker_name, .. } => breaker_name,
        }
    }
}
