//! The failure taxonomy inspected at the executor boundary.

use crate::outcome::{TaskError, TaskErrorKind};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the policy chain.
///
/// Classification happens here, not inside individual policies: the retry
/// policy retries `Transient` (and `Store`) failures, the dead-letter policy
/// captures `Transient`/`Permanent` failures that survive the retry loop, and
/// everything else is surfaced to the worker loop for the broker's own
/// requeue handling.
#[derive(Debug, Clone, Error)]
pub enum ExecutionError {
    /// The handler failed in a way worth retrying.
    #[error("transient failure: {0}")]
    Transient(TaskError),

    /// The handler failed in a way retrying cannot fix.
    #[error("permanent failure: {0}")]
    Permanent(TaskError),

    /// The named dependency's circuit is open; the handler was never invoked.
    #[error("circuit '{name}' is open; call not permitted")]
    CircuitOpen {
        /// Dependency name the breaker tracks.
        name: String,
    },

    /// Admission was denied by the rate limiter; the handler was never invoked.
    #[error("rate limit exceeded for key '{key}'")]
    RateLimited {
        /// Rate-limiter key that was over its window.
        key: String,
        /// Time until the window has room again, when known.
        retry_after: Option<Duration>,
    },

    /// The idempotency key is already held or was already completed without a
    /// cached result. The handler was never invoked.
    #[error("duplicate execution for idempotency key '{key}'")]
    Duplicate {
        /// The contested idempotency key.
        key: String,
        /// True while another worker still holds the key.
        in_progress: bool,
    },

    /// A shared-state round trip failed. Classified transient at the boundary.
    #[error("shared state store error: {0}")]
    Store(#[from] StoreError),
}

impl ExecutionError {
    /// Returns true if this error represents a handler failure (as opposed to
    /// a policy rejection where the handler never ran).
    pub fn is_handler_failure(&self) -> bool {
        matches!(
            self,
            ExecutionError::Transient(_) | ExecutionError::Permanent(_)
        )
    }

    /// Returns true if this is a circuit-open rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ExecutionError::CircuitOpen { .. })
    }

    /// Returns true if this is a rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ExecutionError::RateLimited { .. })
    }

    /// Returns true if this is a duplicate-execution rejection.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ExecutionError::Duplicate { .. })
    }

    /// The underlying task failure, for errors that should be dead-lettered.
    ///
    /// `Store` errors are folded into a transient `TaskError` so exhausted
    /// infrastructure failures leave the same durable trace handler failures
    /// do.
    pub fn task_error(&self) -> Option<TaskError> {
        match self {
            ExecutionError::Transient(error) | ExecutionError::Permanent(error) => {
                Some(error.clone())
            }
            ExecutionError::Store(error) => Some(TaskError {
                kind: TaskErrorKind::Transient,
                message: error.to_string(),
                detail: None,
            }),
            _ => None,
        }
    }
}

/// Errors from a [`SharedStateStore`](crate::store::SharedStateStore) backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or refused the operation.
    #[error("store backend unavailable: {0}")]
    Unavailable(String),

    /// A stored value could not be encoded or decoded.
    #[error("store serialization failed: {0}")]
    Serialization(String),
}

/// Error returned by the broker-facing [`Dispatcher`](crate::handler::Dispatcher).
#[derive(Debug, Clone, Error)]
#[error("dispatch to broker failed: {0}")]
pub struct DispatchError(pub String);
