//! Task invocations as delivered by the broker.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

/// Unique identifier of a task invocation.
///
/// Normally assigned by the broker when the task is enqueued. taskguard only
/// mints ids itself when a dead-lettered task is reprocessed, via
/// [`TaskId::generate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a broker-assigned id.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Mints a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single delivery of a task to a worker.
///
/// Created from the `(task_id, task_name, args, attempt_count)` tuple the
/// broker hands to a worker. The attempt counter is shared between clones:
/// the retry policy re-submits a clone of the invocation for every attempt,
/// and outer policies (dead-letter capture, metrics) must observe the
/// attempts spent by inner ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInvocation {
    /// Broker-assigned unique id for this invocation.
    pub task_id: TaskId,
    /// Registered name of the task type, e.g. `"reports.generate"`.
    pub task_name: String,
    /// Serialized task arguments.
    pub args: serde_json::Value,
    #[serde(
        serialize_with = "serialize_attempts",
        deserialize_with = "deserialize_attempts"
    )]
    attempt_count: Arc<AtomicU32>,
    /// When the broker accepted the task.
    pub enqueued_at: SystemTime,
    /// Cooperative cancellation deadline published by the executor. Handlers
    /// should stop work once it passes. Not part of the wire payload.
    #[serde(skip)]
    pub soft_deadline: Option<SystemTime>,
}

impl TaskInvocation {
    /// Creates a new invocation with a generated id and an attempt count of 0.
    pub fn new<S: Into<String>>(task_name: S, args: serde_json::Value) -> Self {
        Self::with_id(TaskId::generate(), task_name, args)
    }

    /// Creates an invocation for a broker-assigned id.
    pub fn with_id<S: Into<String>>(task_id: TaskId, task_name: S, args: serde_json::Value) -> Self {
        Self {
            task_id,
            task_name: task_name.into(),
            args,
            attempt_count: Arc::new(AtomicU32::new(0)),
            enqueued_at: SystemTime::now(),
            soft_deadline: None,
        }
    }

    /// Sets the delivered attempt count (used when the broker re-delivers).
    pub fn with_attempt_count(self, attempts: u32) -> Self {
        self.attempt_count.store(attempts, Ordering::SeqCst);
        self
    }

    /// Number of attempts recorded so far.
    pub fn attempt_count(&self) -> u32 {
        self.attempt_count.load(Ordering::SeqCst)
    }

    /// Records one more attempt and returns the updated count.
    pub fn record_attempt(&self) -> u32 {
        self.attempt_count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

fn serialize_attempts<S: Serializer>(count: &Arc<AtomicU32>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u32(count.load(Ordering::SeqCst))
}

fn deserialize_attempts<'de, D: Deserializer<'de>>(d: D) -> Result<Arc<AtomicU32>, D::Error> {
    let count = u32::deserialize(d)?;
    Ok(Arc::new(AtomicU32::new(count)))
}
