//! The policy middleware chain.
//!
//! Policies are composable middleware objects sharing one interface:
//! [`Policy::execute`] receives the invocation plus the remainder of the
//! chain as a [`Next`], and decides whether (and how often) to run it. The
//! executor assembles the chain explicitly; there is no implicit stacking.

use crate::error::ExecutionError;
use crate::handler::TaskHandler;
use crate::invocation::TaskInvocation;
use futures::future::BoxFuture;
use std::sync::Arc;

/// The value a completed task produces.
pub type TaskOutput = serde_json::Value;

/// A single link of cross-cutting behavior around a task handler.
///
/// Implementations call `next.run(invocation)` zero times (rejection), once
/// (pass-through), or several times (retry). `Next` is cheap to clone, which
/// is what makes re-running the inner chain per attempt possible.
pub trait Policy: Send + Sync + 'static {
    /// Executes the remainder of the chain under this policy.
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>>;
}

/// The remainder of a policy chain, ending at the task handler.
#[derive(Clone)]
pub struct Next {
    policies: Arc<[Arc<dyn Policy>]>,
    index: usize,
    handler: Arc<dyn TaskHandler>,
}

impl Next {
    /// Builds a chain over `policies` (outermost first) terminating at `handler`.
    pub fn new(policies: Arc<[Arc<dyn Policy>]>, handler: Arc<dyn TaskHandler>) -> Self {
        Self {
            policies,
            index: 0,
            handler,
        }
    }

    /// Runs the rest of the chain for one invocation.
    pub fn run(self, invocation: TaskInvocation) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        match self.policies.get(self.index).cloned() {
            Some(policy) => {
                let next = Next {
                    policies: self.policies,
                    index: self.index + 1,
                    handler: self.handler,
                };
                policy.execute(invocation, next)
            }
            None => {
                let handler = self.handler;
                Box::pin(async move { handler.call(invocation).await.into_result() })
            }
        }
    }
}
