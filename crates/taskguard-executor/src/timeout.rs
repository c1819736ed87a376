//! Hard execution timeouts.

use futures::future::BoxFuture;
use std::time::Duration;
use taskguard_core::{ExecutionError, Next, Policy, TaskError, TaskInvocation, TaskOutput};

/// Policy that cancels an attempt outright once the hard timeout passes.
///
/// Innermost in the chain, directly around the handler, so the timeout
/// bounds a single attempt and the resulting failure feeds the same
/// retry/circuit-breaker path as any other transient failure.
pub struct TimeLimitPolicy {
    limit: Duration,
}

impl TimeLimitPolicy {
    /// Creates a policy with the given hard limit per attempt.
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }
}

impl Policy for TimeLimitPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let limit = self.limit;
        Box::pin(async move {
            match tokio::time::timeout(limit, next.run(invocation)).await {
                Ok(result) => result,
                Err(_elapsed) => Err(ExecutionError::Transient(TaskError::timeout(format!(
                    "hard timeout of {limit:?} exceeded"
                )))),
            }
        })
    }
}
