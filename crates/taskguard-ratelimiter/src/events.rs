//! Events emitted by the rate limiter.

use std::time::{Duration, Instant};
use taskguard_core::events::PolicyEvent;

/// Events emitted on admission decisions.
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A call was admitted within its key's window.
    Admitted {
        /// Name of the limiter instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The admission key.
        key: String,
        /// Admitted calls now inside the rolling window.
        in_window: usize,
    },
    /// A call was rejected because its key's window is full.
    Rejected {
        /// Name of the limiter instance.
        policy_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The admission key.
        key: String,
        /// Time until the window has room again.
        retry_after: Option<Duration>,
    },
}

impl PolicyEvent for RateLimiterEvent {
    fn event_type(&self) -> &'static str {
        match self {
            RateLimiterEvent::Admitted { .. } => "admitted",
            RateLimiterEvent::Rejected { .. } => "rejected",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            RateLimiterEvent::Admitted { timestamp, .. }
            | RateLimiterEvent::Rejected { timestamp, .. } => *timestamp,
        }
    }

    fn policy_name(&self) -> &str {
        match self {
            RateLimiterEvent::Admitted { policy_name, .. }
            | RateLimiterEvent::Rejected { policy_name, .. } => policy_name,
        }
    }
}
