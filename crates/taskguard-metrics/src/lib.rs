//! Execution metrics for taskguard.
//!
//! Exposes the worker-side metric surface through the [`metrics`] facade;
//! install any compatible exporter (Prometheus, statsd, ...) to pull them:
//!
//! - counters: `task_started_total`, `task_completed_total`,
//!   `task_failed_total`, `task_retry_total`, `task_rejected_total{reason}`
//! - histogram: `task_duration_seconds`
//! - gauges: `active_tasks`, `queue_length`, `worker_online`,
//!   `task_memory_mb`
//!
//! All series are labeled by `task_name`. Recording never errors and never
//! panics into the execution path; a monitoring failure is logged and the
//! business task proceeds untouched.

mod recorder;

pub use recorder::{MetricsEvent, MetricsRecorder, RejectReason};

use futures::future::BoxFuture;
use std::time::Instant;
use taskguard_core::{ExecutionError, Next, Policy, TaskInvocation, TaskOutput};

/// Policy that wraps the whole chain in lifecycle metrics.
///
/// Assembled outermost by the executor, so policy rejections (circuit open,
/// rate limited, duplicate) are measured as well as handler results.
pub struct MetricsPolicy {
    recorder: MetricsRecorder,
}

impl MetricsPolicy {
    /// Wraps a recorder as a chain policy.
    pub fn new(recorder: MetricsRecorder) -> Self {
        Self { recorder }
    }
}

impl Policy for MetricsPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let recorder = self.recorder;
        Box::pin(async move {
            let task_name = invocation.task_name.clone();
            recorder.record(MetricsEvent::Started {
                task_name: task_name.clone(),
            });
            let started = Instant::now();

            let result = next.run(invocation).await;

            let duration = started.elapsed();
            match &result {
                Ok(_) => recorder.record(MetricsEvent::Completed {
                    task_name,
                    duration,
                }),
                Err(error) => {
                    let reason = match error {
                        ExecutionError::CircuitOpen { .. } => Some(RejectReason::CircuitOpen),
                        ExecutionError::RateLimited { .. } => Some(RejectReason::RateLimited),
                        ExecutionError::Duplicate { .. } => Some(RejectReason::Duplicate),
                        _ => None,
                    };
                    match reason {
                        Some(reason) => recorder.record(MetricsEvent::Rejected {
                            task_name,
                            reason,
                        }),
                        None => recorder.record(MetricsEvent::Failed {
                            task_name,
                            duration,
                        }),
                    }
                }
            }

            result
        })
    }
}
