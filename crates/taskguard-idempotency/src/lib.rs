//! Cross-worker execute-once enforcement for taskguard.
//!
//! Duplicate triggers of the same task signature are collapsed to a single
//! execution within a time window: the first worker to acquire the
//! signature's key runs the handler, everyone else is told the execution is
//! already in progress (or receives the cached result of the completed run).
//!
//! The guard sits *outside* the retry policy in the executor's chain, so a
//! key is decided once per delivery (never re-contested between retry
//! attempts) and is released whatever way the execution ends.

mod config;
mod events;
mod guard;

pub use config::{IdempotencyConfig, IdempotencyConfigBuilder};
pub use events::IdempotencyEvent;
pub use guard::{execution_key, Acquire, EntryStatus, IdempotencyGuard, Release};

use futures::future::BoxFuture;
use taskguard_core::{ExecutionError, Next, Policy, TaskInvocation, TaskOutput};

/// Policy that runs the inner chain at most once per idempotency key.
pub struct IdempotencyPolicy {
    guard: IdempotencyGuard,
}

impl IdempotencyPolicy {
    /// Wraps a guard as a chain policy.
    pub fn new(guard: IdempotencyGuard) -> Self {
        Self { guard }
    }
}

impl Policy for IdempotencyPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let guard = self.guard.clone();
        Box::pin(async move {
            let key = execution_key(&invocation.task_name, &invocation.args);

            match guard.acquire(&key).await? {
                Acquire::Acquired => {}
                Acquire::AlreadyInProgress => {
                    return Err(ExecutionError::Duplicate {
                        key,
                        in_progress: true,
                    });
                }
                Acquire::AlreadyCompleted { result } => {
                    // A cached result stands in for the skipped execution.
                    return match result {
                        Some(value) => Ok(value),
                        None => Err(ExecutionError::Duplicate {
                            key,
                            in_progress: false,
                        }),
                    };
                }
            }

            let result = next.run(invocation).await;

            // Failed executions abandon the key so the broker's redelivery
            // (or a dead-letter reprocess) is not locked out for the ttl.
            let release = match &result {
                Ok(value) => Release::Completed(Some(value.clone())),
                Err(_) => Release::Abandoned,
            };
            // Best-effort: a stuck entry still expires with its ttl, and the
            // execution's own result must not be masked by a store blip.
            if let Err(_store_error) = guard.release(&key, release).await {
                #[cfg(feature = "tracing")]
                tracing::warn!(key = %key, error = %_store_error, "failed to release idempotency key");
            }

            result
        })
    }
}
