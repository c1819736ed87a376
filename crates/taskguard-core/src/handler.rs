//! Handler and broker-facing traits.

use crate::error::DispatchError;
use crate::invocation::TaskInvocation;
use crate::outcome::Outcome;
use async_trait::async_trait;
use std::future::Future;

/// An asynchronous task body.
///
/// Handlers report how they finished through the [`Outcome`] tag; the policy
/// chain never inspects panics or downcasts error types.
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Runs the task body for one invocation.
    async fn call(&self, invocation: TaskInvocation) -> Outcome;
}

/// Adapter turning an async closure into a [`TaskHandler`].
pub struct HandlerFn<F> {
    f: F,
}

impl<F> HandlerFn<F> {
    /// Wraps an async closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskHandler for HandlerFn<F>
where
    F: Fn(TaskInvocation) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Outcome> + Send + 'static,
{
    async fn call(&self, invocation: TaskInvocation) -> Outcome {
        (self.f)(invocation).await
    }
}

/// The broker interface this layer consumes.
///
/// Workers receive invocations from the broker out of band; taskguard only
/// dispatches through it when dead-lettered tasks are reprocessed.
#[async_trait]
pub trait Dispatcher: Send + Sync + 'static {
    /// Enqueues a task and returns the broker-assigned id.
    async fn dispatch(
        &self,
        task_name: &str,
        args: serde_json::Value,
    ) -> Result<crate::invocation::TaskId, DispatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn handler_fn_forwards_the_invocation() {
        let handler = HandlerFn::new(|invocation: TaskInvocation| async move {
            Outcome::Success(json!(invocation.task_name))
        });

        let outcome = handler
            .call(TaskInvocation::new("reports.generate", json!(null)))
            .await;

        match outcome {
            Outcome::Success(value) => assert_eq!(value, json!("reports.generate")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }
}
