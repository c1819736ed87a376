//! Core infrastructure for taskguard.
//!
//! This crate provides the shared vocabulary used by every taskguard policy:
//! - [`TaskInvocation`]: a single delivery of a task to a worker
//! - [`Outcome`]: the tagged result a task handler reports back
//! - [`ExecutionError`]: the failure taxonomy inspected at the executor boundary
//! - [`Policy`] and [`Next`]: the middleware chain policies compose through
//! - [`SharedStateStore`]: the atomic key-value interface backing cross-worker
//!   state (circuit breakers, rate windows, idempotency locks)
//! - Event system for observability

pub mod error;
pub mod events;
pub mod handler;
pub mod invocation;
pub mod outcome;
pub mod policy;
pub mod store;

pub use error::{DispatchError, ExecutionError, StoreError};
pub use events::{EventListener, EventListeners, FnListener, PolicyEvent};
pub use handler::{Dispatcher, HandlerFn, TaskHandler};
pub use invocation::{TaskId, TaskInvocation};
pub use outcome::{Outcome, TaskError, TaskErrorKind};
pub use policy::{Next, Policy, TaskOutput};
pub use store::{InMemoryStateStore, SharedStateStore};
