//! Dead-letter capture and reprocessing for taskguard.
//!
//! Tasks that exhaust their retries, or fail permanently, leave a durable
//! [`DeadLetterRecord`] behind: the invocation's arguments, the failure that
//! killed it, and how many retries were spent. Operators inspect records
//! through the management API and resubmit them to the broker; reprocessing
//! never mutates a record beyond flagging it `reprocessed`. The re-run is a
//! brand-new invocation with a fresh id and a zeroed attempt count.
//!
//! Circuit-open and rate-limit rejections never produce records: the handler
//! was never invoked, so there is nothing to bury.

mod events;
mod record;
mod store;

pub use events::DeadLetterEvent;
pub use record::{DeadLetterFilter, DeadLetterRecord};
pub use store::{DeadLetterStore, InMemoryDeadLetterStore};

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use taskguard_core::events::{EventListeners, FnListener};
use taskguard_core::{
    DispatchError, Dispatcher, ExecutionError, Next, Policy, TaskId, TaskInvocation, TaskOutput,
};
use thiserror::Error;

/// Errors from the dead-letter subsystem.
#[derive(Debug, Error)]
pub enum DeadLetterError {
    /// No record exists with the given id.
    #[error("no dead letter record with id '{record_id}'")]
    NotFound {
        /// The id that was looked up.
        record_id: String,
    },

    /// The broker refused the resubmitted task.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The storage backend failed.
    #[error("dead letter backend error: {0}")]
    Backend(String),
}

/// Outcome counts of a bulk reprocess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BulkReprocessOutcome {
    /// Records successfully resubmitted.
    pub succeeded: usize,
    /// Records whose resubmission failed.
    pub failed: usize,
}

/// The operator-facing dead-letter queue over a pluggable store.
pub struct DeadLetterQueue {
    store: Arc<dyn DeadLetterStore>,
    event_listeners: EventListeners<DeadLetterEvent>,
    name: String,
}

impl DeadLetterQueue {
    /// Creates a queue over the given store.
    pub fn new(store: Arc<dyn DeadLetterStore>) -> Self {
        Self {
            store,
            event_listeners: EventListeners::new(),
            name: "dead-letter".to_string(),
        }
    }

    /// Registers a callback when a record is captured.
    pub fn on_captured<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let DeadLetterEvent::Captured {
                record_id,
                task_name,
                ..
            } = event
            {
                f(record_id, task_name);
            }
        }));
        self
    }

    /// Persists a record for a terminally failed invocation.
    ///
    /// Called by the executor's dead-letter policy, exactly once per
    /// terminal failure.
    pub async fn capture(
        &self,
        invocation: &TaskInvocation,
        error: &taskguard_core::TaskError,
    ) -> Result<String, DeadLetterError> {
        let record_id = self.store.capture(invocation, error).await?;
        #[cfg(feature = "tracing")]
        tracing::warn!(
            task = %invocation.task_name,
            task_id = %invocation.task_id,
            record_id = %record_id,
            "task dead-lettered"
        );
        self.event_listeners.emit(&DeadLetterEvent::Captured {
            policy_name: self.name.clone(),
            timestamp: Instant::now(),
            record_id: record_id.clone(),
            task_name: invocation.task_name.clone(),
        });
        Ok(record_id)
    }

    /// Lists records matching `filter`, oldest first.
    pub async fn list(
        &self,
        filter: &DeadLetterFilter,
    ) -> Result<Vec<DeadLetterRecord>, DeadLetterError> {
        self.store.list(filter).await
    }

    /// Reads one record by id.
    pub async fn get(&self, record_id: &str) -> Result<Option<DeadLetterRecord>, DeadLetterError> {
        self.store.get(record_id).await
    }

    /// Resubmits one record to the broker.
    ///
    /// A fresh invocation is dispatched (new task id, attempt count 0) and
    /// the record is flagged `reprocessed`; nothing else about it changes.
    pub async fn reprocess(
        &self,
        record_id: &str,
        dispatcher: &dyn Dispatcher,
    ) -> Result<TaskId, DeadLetterError> {
        let record = self
            .get(record_id)
            .await?
            .ok_or_else(|| DeadLetterError::NotFound {
                record_id: record_id.to_string(),
            })?;

        let task_id = dispatcher
            .dispatch(&record.task_name, record.args.clone())
            .await?;
        self.store.mark_reprocessed(record_id).await?;

        #[cfg(feature = "tracing")]
        tracing::info!(record_id = %record_id, new_task_id = %task_id, "dead letter reprocessed");
        self.event_listeners.emit(&DeadLetterEvent::Reprocessed {
            policy_name: self.name.clone(),
            timestamp: Instant::now(),
            record_id: record_id.to_string(),
        });
        Ok(task_id)
    }

    /// Resubmits every record matching `filter`, counting per-record outcomes.
    pub async fn bulk_reprocess(
        &self,
        filter: &DeadLetterFilter,
        dispatcher: &dyn Dispatcher,
    ) -> Result<BulkReprocessOutcome, DeadLetterError> {
        let mut outcome = BulkReprocessOutcome::default();
        for record in self.list(filter).await? {
            match self.reprocess(&record.record_id, dispatcher).await {
                Ok(_) => outcome.succeeded += 1,
                Err(_) => outcome.failed += 1,
            }
        }
        Ok(outcome)
    }

    /// Deletes one record. Returns false if it did not exist.
    pub async fn purge(&self, record_id: &str) -> Result<bool, DeadLetterError> {
        self.store.purge(record_id).await
    }

    /// Deletes every record matching `filter`, returning how many went away.
    pub async fn purge_matching(
        &self,
        filter: &DeadLetterFilter,
    ) -> Result<usize, DeadLetterError> {
        let mut purged = 0;
        for record in self.list(filter).await? {
            if self.purge(&record.record_id).await? {
                purged += 1;
            }
        }
        Ok(purged)
    }
}

/// Policy that captures terminal failures into the dead-letter queue.
///
/// Sits directly inside the metrics policy: whatever error survives the
/// retry loop arrives here exactly once per execution. Only handler
/// failures (and store failures folded into them) are captured; a
/// circuit-open or rate-limited rejection means the handler never ran.
pub struct DeadLetterPolicy {
    queue: Arc<DeadLetterQueue>,
}

impl DeadLetterPolicy {
    /// Wraps a queue as a chain policy.
    pub fn new(queue: Arc<DeadLetterQueue>) -> Self {
        Self { queue }
    }
}

impl Policy for DeadLetterPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let queue = Arc::clone(&self.queue);
        Box::pin(async move {
            let result = next.run(invocation.clone()).await;

            if let Err(error) = &result {
                if let Some(task_error) = error.task_error() {
                    // Capture failures must not mask the execution error.
                    if let Err(_capture_error) = queue.capture(&invocation, &task_error).await {
                        #[cfg(feature = "tracing")]
                        tracing::error!(
                            task = %invocation.task_name,
                            error = %_capture_error,
                            "failed to capture dead letter"
                        );
                    }
                }
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use taskguard_core::{HandlerFn, Outcome, TaskError};

    /// Records dispatched tasks instead of talking to a broker.
    struct RecordingDispatcher {
        dispatched: Mutex<Vec<(String, serde_json::Value)>>,
        fail: bool,
    }

    impl RecordingDispatcher {
        fn new() -> Self {
            Self {
                dispatched: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                dispatched: Mutex::new(Vec::new()),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Dispatcher for RecordingDispatcher {
        async fn dispatch(
            &self,
            task_name: &str,
            args: serde_json::Value,
        ) -> Result<TaskId, DispatchError> {
            if self.fail {
                return Err(DispatchError("broker unavailable".into()));
            }
            self.dispatched
                .lock()
                .unwrap()
                .push((task_name.to_string(), args));
            Ok(TaskId::generate())
        }
    }

    fn queue() -> (Arc<DeadLetterQueue>, Arc<InMemoryDeadLetterStore>) {
        let store = Arc::new(InMemoryDeadLetterStore::new());
        let queue = Arc::new(DeadLetterQueue::new(
            Arc::clone(&store) as Arc<dyn DeadLetterStore>
        ));
        (queue, store)
    }

    #[tokio::test]
    async fn reprocess_dispatches_a_fresh_invocation() {
        let (queue, _) = queue();
        let invocation = TaskInvocation::new("reports.generate", json!({"id": 9}));
        invocation.record_attempt();
        let record_id = queue
            .capture(&invocation, &TaskError::transient("down"))
            .await
            .unwrap();

        let dispatcher = RecordingDispatcher::new();
        let new_id = queue.reprocess(&record_id, &dispatcher).await.unwrap();

        assert_ne!(new_id, invocation.task_id);
        let dispatched = dispatcher.dispatched.lock().unwrap();
        assert_eq!(dispatched.len(), 1);
        assert_eq!(dispatched[0].0, "reports.generate");
        assert_eq!(dispatched[0].1, json!({"id": 9}));

        let record = queue.get(&record_id).await.unwrap().unwrap();
        assert!(record.reprocessed);
        assert!(record.reprocessed_at.is_some());
    }

    #[tokio::test]
    async fn reprocess_of_unknown_record_fails() {
        let (queue, _) = queue();
        let dispatcher = RecordingDispatcher::new();
        assert!(matches!(
            queue.reprocess("missing", &dispatcher).await,
            Err(DeadLetterError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn bulk_reprocess_counts_outcomes() {
        let (queue, _) = queue();
        for id in 0..3 {
            let invocation = TaskInvocation::new("demo", json!({ "id": id }));
            queue
                .capture(&invocation, &TaskError::transient("down"))
                .await
                .unwrap();
        }

        let ok = queue
            .bulk_reprocess(&DeadLetterFilter::all(), &RecordingDispatcher::new())
            .await
            .unwrap();
        assert_eq!(ok, BulkReprocessOutcome {
            succeeded: 3,
            failed: 0
        });

        // Reprocessed records drop out of the default filter.
        let again = queue
            .bulk_reprocess(&DeadLetterFilter::all(), &RecordingDispatcher::new())
            .await
            .unwrap();
        assert_eq!(again.succeeded, 0);
    }

    #[tokio::test]
    async fn bulk_reprocess_reports_dispatch_failures() {
        let (queue, _) = queue();
        let invocation = TaskInvocation::new("demo", json!(null));
        queue
            .capture(&invocation, &TaskError::transient("down"))
            .await
            .unwrap();

        let outcome = queue
            .bulk_reprocess(&DeadLetterFilter::all(), &RecordingDispatcher::failing())
            .await
            .unwrap();
        assert_eq!(outcome, BulkReprocessOutcome {
            succeeded: 0,
            failed: 1
        });
    }

    #[tokio::test]
    async fn policy_captures_handler_failures_only() {
        let (queue, store) = queue();
        let policies: Arc<[Arc<dyn Policy>]> =
            Arc::from(vec![
                Arc::new(DeadLetterPolicy::new(Arc::clone(&queue))) as Arc<dyn Policy>
            ]);

        let failing = Arc::new(HandlerFn::new(|_| async {
            Outcome::Permanent(TaskError::permanent("bad input"))
        }));
        let _ = Next::new(Arc::clone(&policies), failing)
            .run(TaskInvocation::new("demo", json!(null)))
            .await;
        assert_eq!(store.len(), 1);

        let succeeding = Arc::new(HandlerFn::new(|_| async { Outcome::done() }));
        let _ = Next::new(policies, succeeding)
            .run(TaskInvocation::new("demo", json!(null)))
            .await;
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn purge_matching_clears_a_task_type() {
        let (queue, store) = queue();
        for name in ["a", "a", "b"] {
            let invocation = TaskInvocation::new(name, json!(null));
            queue
                .capture(&invocation, &TaskError::permanent("bad"))
                .await
                .unwrap();
        }

        let purged = queue
            .purge_matching(&DeadLetterFilter::all().task_name("a"))
            .await
            .unwrap();
        assert_eq!(purged, 2);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn captured_events_fire() {
        let captures = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&captures);
        let store = Arc::new(InMemoryDeadLetterStore::new());
        let queue = DeadLetterQueue::new(store as Arc<dyn DeadLetterStore>).on_captured(
            move |_record_id, _task| {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        let invocation = TaskInvocation::new("demo", json!(null));
        queue
            .capture(&invocation, &TaskError::transient("down"))
            .await
            .unwrap();
        assert_eq!(captures.load(Ordering::SeqCst), 1);
    }
}
