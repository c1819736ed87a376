//! Events emitted by the retry policy.

use std::time::{Duration, Instant};
use taskguard_core::events::PolicyEvent;

/// Events emitted during the retry lifecycle.
#[derive(Debug, Clone)]
pub enum RetryEvent {
    /// A failed attempt will be retried after `delay`.
    Retry {
        /// Name of the retry policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The retry about to be made (1-indexed).
        attempt: u32,
        /// Backoff delay before the retry.
        delay: Duration,
    },
    /// The invocation succeeded after `attempts` total attempts.
    Success {
        /// Name of the retry policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Total attempts including the first.
        attempts: u32,
    },
    /// Every permitted attempt failed; the final error is surfaced.
    Exhausted {
        /// Name of the retry policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Total attempts including the first.
        attempts: u32,
    },
    /// An error was not retryable and was surfaced immediately.
    IgnoredError {
        /// Name of the retry policy instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl PolicyEvent for RetryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RetryEvent::Retry { .. } => "retry",
            RetryEvent::Success { .. } => "success",
            RetryEvent::Exhausted { .. } => "exhausted",
            RetryEvent::IgnoredError { .. } => "ignored_error",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RetryEvent::Retry { timestamp, .. }
            | RetryEvent::Success { timestamp, .. }
            | RetryEvent::Exhausted { timestamp, .. }
            | RetryEvent::IgnoredError { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            RetryEvent::Retry { policy_name, .. }
            | RetryEvent::Success { policy_name, .. }
            | RetryEvent::Exhausted { policy_name, .. }
            | RetryEvent::IgnoredError { policy_name, .. } => policy_name,
        }
    }
}
