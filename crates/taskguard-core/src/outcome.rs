//! Tagged handler results.
//!
//! Task handlers never signal failure by panicking or by raising through the
//! policy chain. They return an [`Outcome`] whose tag tells the executor how
//! to treat the failure: retry it, or route it straight to the dead-letter
//! store.

use crate::error::ExecutionError;
use crate::policy::TaskOutput;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a handler failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskErrorKind {
    /// Recoverable failure (network blip, dependency hiccup). Retried per policy.
    Transient,
    /// Unrecoverable failure (validation error, bad input). Dead-lettered without retry.
    Permanent,
    /// The task ran out of time. Treated as transient unless configured otherwise.
    Timeout,
}

impl fmt::Display for TaskErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskErrorKind::Transient => f.write_str("transient"),
            TaskErrorKind::Permanent => f.write_str("permanent"),
            TaskErrorKind::Timeout => f.write_str("timeout"),
        }
    }
}

/// A task failure as reported by a handler (or synthesized by a policy,
/// e.g. for a hard timeout).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} failure: {message}")]
pub struct TaskError {
    /// How the executor should classify this failure.
    pub kind: TaskErrorKind,
    /// Human-readable summary.
    pub message: String,
    /// Optional diagnostic detail (source chain, backtrace rendering).
    pub detail: Option<String>,
}

impl TaskError {
    /// A retryable failure.
    pub fn transient<S: Into<String>>(message: S) -> Self {
        Self {
            kind: TaskErrorKind::Transient,
            message: message.into(),
            detail: None,
        }
    }

    /// A failure that must not be retried.
    pub fn permanent<S: Into<String>>(message: S) -> Self {
        Self {
            kind: TaskErrorKind::Permanent,
            message: message.into(),
            detail: None,
        }
    }

    /// A timeout failure.
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        Self {
            kind: TaskErrorKind::Timeout,
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches diagnostic detail to the failure.
    pub fn with_detail<S: Into<String>>(mut self, detail: S) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// The tagged result of one handler invocation.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The task completed; the value may be cached by the idempotency guard.
    Success(TaskOutput),
    /// The task failed in a way worth retrying.
    Transient(TaskError),
    /// The task failed in a way retrying cannot fix.
    Permanent(TaskError),
}

impl Outcome {
    /// A success with no meaningful return value.
    pub fn done() -> Self {
        Outcome::Success(serde_json::Value::Null)
    }

    /// Converts the tag into the executor-facing result type.
    pub fn into_result(self) -> Result<TaskOutput, ExecutionError> {
        match self {
            Outcome::Success(value) => Ok(value),
            Outcome::Transient(error) => Err(ExecutionError::Transient(error)),
            Outcome::Permanent(error) => Err(ExecutionError::Permanent(error)),
        }
    }

    /// Returns true for the `Success` tag.
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }
}

impl<E: std::error::Error> From<Result<TaskOutput, E>> for Outcome {
    /// Treats any error as transient. Handlers that distinguish permanent
    /// failures should construct the tag explicitly.
    fn from(result: Result<TaskOutput, E>) -> Self {
        match result {
            Ok(value) => Outcome::Success(value),
            Err(error) => Outcome::Transient(TaskError::transient(error.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_converts_to_ok() {
        let result = Outcome::Success(json!(42)).into_result();
        assert_eq!(result.unwrap(), json!(42));
    }

    #[test]
    fn transient_converts_to_transient_error() {
        let result = Outcome::Transient(TaskError::transient("socket reset")).into_result();
        assert!(matches!(result, Err(ExecutionError::Transient(_))));
    }

    #[test]
    fn permanent_converts_to_permanent_error() {
        let result = Outcome::Permanent(TaskError::permanent("bad payload")).into_result();
        assert!(matches!(result, Err(ExecutionError::Permanent(_))));
    }

    #[test]
    fn detail_is_carried() {
        let error = TaskError::transient("boom").with_detail("stack: ...");
        assert_eq!(error.detail.as_deref(), Some("stack: ..."));
    }
}
