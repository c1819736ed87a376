//! Events emitted by the dead-letter queue.

use std::time::Instant;
use taskguard_core::events::PolicyEvent;

/// Events emitted as records are captured and resubmitted.
#[derive(Debug, Clone)]
pub enum DeadLetterEvent {
    /// A terminally failed invocation was recorded.
    Captured {
        /// Name of the queue instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the new record.
        record_id: String,
        /// Task type of the failed invocation.
        task_name: String,
    },
    /// A record was resubmitted to the broker.
    Reprocessed {
        /// Name of the queue instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Id of the resubmitted record.
        record_id: String,
    },
}

impl PolicyEvent for DeadLetterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeadLetterEvent::Captured { .. } => "captured",
            DeadLetterEvent::Reprocessed { .. } => "reprocessed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            DeadLetterEvent::Captured { timestamp, .. }
            | DeadLetterEvent::Reprocessed { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            DeadLetterEvent::Captured { policy_name, .. }
            | DeadLetterEvent::Reprocessed { policy_name, .. } => policy_name,
        }
    }
}
