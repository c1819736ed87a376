//! Composable reliability policies for background task execution.
//!
//! taskguard wraps asynchronous job handlers with the cross-cutting behavior
//! a worker fleet needs: bounded retry with backoff, per-dependency circuit
//! breaking, rate limiting, execution idempotency, dead-letter capture, and
//! execution metrics. Policies share one middleware interface and are
//! composed explicitly by the executor in a fixed, documented order.
//!
//! Each policy lives in its own crate and is enabled here with a feature
//! flag; `full` turns everything on:
//!
//! ```toml
//! [dependencies]
//! taskguard = { version = "0.1", features = ["full"] }
//! ```
//!
//! The core types (invocations, outcomes, the error taxonomy, the shared
//! state store) are always available.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use taskguard_core as core;

pub use taskguard_core::{
    Dispatcher, EventListener, EventListeners, ExecutionError, FnListener, HandlerFn,
    InMemoryStateStore, Next, Outcome, Policy, PolicyEvent, SharedStateStore, StoreError,
    TaskError, TaskErrorKind, TaskHandler, TaskId, TaskInvocation, TaskOutput,
};

#[cfg(feature = "circuitbreaker")]
#[cfg_attr(docsrs, doc(cfg(feature = "circuitbreaker")))]
pub use taskguard_circuitbreaker as circuitbreaker;

#[cfg(feature = "deadletter")]
#[cfg_attr(docsrs, doc(cfg(feature = "deadletter")))]
pub use taskguard_deadletter as deadletter;

#[cfg(feature = "executor")]
#[cfg_attr(docsrs, doc(cfg(feature = "executor")))]
pub use taskguard_executor as executor;

#[cfg(feature = "idempotency")]
#[cfg_attr(docsrs, doc(cfg(feature = "idempotency")))]
pub use taskguard_idempotency as idempotency;

#[cfg(feature = "metrics")]
#[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
pub use taskguard_metrics as metrics;

#[cfg(feature = "ratelimiter")]
#[cfg_attr(docsrs, doc(cfg(feature = "ratelimiter")))]
pub use taskguard_ratelimiter as ratelimiter;

#[cfg(feature = "retry")]
#[cfg_attr(docsrs, doc(cfg(feature = "retry")))]
pub use taskguard_retry as retry;

#[cfg(feature = "executor")]
#[cfg_attr(docsrs, doc(cfg(feature = "executor")))]
pub use taskguard_executor::{ExecutorConfig, PolicyRegistry, TaskExecutor, TaskPolicy};
