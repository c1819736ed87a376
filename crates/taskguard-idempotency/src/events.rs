//! Events emitted by the idempotency guard.

use std::time::Instant;
use taskguard_core::events::PolicyEvent;

/// Events emitted as keys are acquired, contested, and released.
#[derive(Debug, Clone)]
pub enum IdempotencyEvent {
    /// The key was free and is now held by this worker.
    Acquired {
        /// Name of the guard instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The idempotency key.
        key: String,
    },
    /// The key was already held or completed; execution was skipped.
    DuplicateBlocked {
        /// Name of the guard instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The idempotency key.
        key: String,
        /// True while another worker still holds the key.
        in_progress: bool,
    },
    /// The key was released.
    Released {
        /// Name of the guard instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The idempotency key.
        key: String,
        /// True if the entry was marked completed rather than removed.
        completed: bool,
    },
}

impl PolicyEvent for IdempotencyEvent {
    fn event_type(&self) -> &'static str {
        match self {
            IdempotencyEvent::Acquired { .. } => "acquired",
            IdempotencyEvent::DuplicateBlocked { .. } => "duplicate_blocked",
            IdempotencyEvent::Released { .. } => "released",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            IdempotencyEvent::Acquired { timestamp, .. }
            | IdempotencyEvent::DuplicateBlocked { timestamp, .. }
            | IdempotencyEvent::Released { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            IdempotencyEvent::Acquired { policy_name, .. }
            | IdempotencyEvent::DuplicateBlocked { policy_name, .. }
            | IdempotencyEvent::Released { policy_name, .. } => policy_name,
        }
    }
}
