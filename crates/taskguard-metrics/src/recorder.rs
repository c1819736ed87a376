//! The metrics recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Why a task was turned away without running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// A circuit breaker was open.
    CircuitOpen,
    /// Admission was denied by the rate limiter.
    RateLimited,
    /// The idempotency key was already taken.
    Duplicate,
}

impl RejectReason {
    fn as_label(self) -> &'static str {
        match self {
            RejectReason::CircuitOpen => "circuit_open",
            RejectReason::RateLimited => "rate_limited",
            RejectReason::Duplicate => "duplicate",
        }
    }
}

/// A lifecycle event of one task execution.
#[derive(Debug, Clone)]
pub enum MetricsEvent {
    /// An execution began.
    Started {
        /// Task type name.
        task_name: String,
    },
    /// An execution finished successfully.
    Completed {
        /// Task type name.
        task_name: String,
        /// Wall-clock execution time, including policy overhead.
        duration: Duration,
    },
    /// An execution failed terminally.
    Failed {
        /// Task type name.
        task_name: String,
        /// Wall-clock execution time, including policy overhead.
        duration: Duration,
    },
    /// A retry attempt was scheduled.
    Retried {
        /// Task type name.
        task_name: String,
    },
    /// The execution was rejected before the handler ran.
    Rejected {
        /// Task type name.
        task_name: String,
        /// Why the task was turned away.
        reason: RejectReason,
    },
}

impl MetricsEvent {
    fn task_name(&self) -> &str {
        match self {
            MetricsEvent::Started { task_name }
            | MetricsEvent::Completed { task_name, .. }
            | MetricsEvent::Failed { task_name, .. }
            | MetricsEvent::Retried { task_name }
            | MetricsEvent::Rejected { task_name, .. } => task_name,
        }
    }
}

/// Sink for execution lifecycle events.
///
/// Forwards to whatever exporter the process installed through the
/// [`metrics`] facade. Recording is strictly side-effect only and never
/// fails: malformed events are dropped with a warning because monitoring
/// must not take a business task down with it.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    /// Creates a recorder.
    pub fn new() -> Self {
        Self
    }

    /// Records one lifecycle event.
    pub fn record(&self, event: MetricsEvent) {
        let task_name = event.task_name();
        if task_name.is_empty() {
            tracing::warn!(?event, "dropping metrics event with empty task name");
            return;
        }
        let task_name = task_name.to_string();

        match event {
            MetricsEvent::Started { .. } => {
                counter!("task_started_total", "task_name" => task_name.clone()).increment(1);
                gauge!("active_tasks", "task_name" => task_name).increment(1.0);
            }
            MetricsEvent::Completed { duration, .. } => {
                counter!("task_completed_total", "task_name" => task_name.clone()).increment(1);
                histogram!("task_duration_seconds", "task_name" => task_name.clone())
                    .record(duration.as_secs_f64());
                gauge!("active_tasks", "task_name" => task_name).decrement(1.0);
            }
            MetricsEvent::Failed { duration, .. } => {
                counter!("task_failed_total", "task_name" => task_name.clone()).increment(1);
                histogram!("task_duration_seconds", "task_name" => task_name.clone())
                    .record(duration.as_secs_f64());
                gauge!("active_tasks", "task_name" => task_name).decrement(1.0);
            }
            MetricsEvent::Retried { .. } => {
                counter!("task_retry_total", "task_name" => task_name).increment(1);
            }
            MetricsEvent::Rejected { reason, .. } => {
                counter!(
                    "task_rejected_total",
                    "task_name" => task_name.clone(),
                    "reason" => reason.as_label()
                )
                .increment(1);
                gauge!("active_tasks", "task_name" => task_name).decrement(1.0);
            }
        }
    }

    /// Publishes the broker's queue depth for one task type.
    pub fn set_queue_length(&self, task_name: &str, depth: f64) {
        if task_name.is_empty() {
            tracing::warn!("dropping queue_length gauge with empty task name");
            return;
        }
        gauge!("queue_length", "task_name" => task_name.to_string()).set(depth);
    }

    /// Publishes how many workers are online.
    pub fn set_worker_online(&self, workers: f64) {
        gauge!("worker_online").set(workers);
    }

    /// Publishes the resident memory of one task type's executions.
    pub fn set_task_memory_mb(&self, task_name: &str, memory_mb: f64) {
        if task_name.is_empty() {
            tracing::warn!("dropping task_memory_mb gauge with empty task name");
            return;
        }
        gauge!("task_memory_mb", "task_name" => task_name.to_string()).set(memory_mb);
    }
}
