//! Policy composition and task execution for taskguard.
//!
//! This crate ties the individual policies into the worker-facing API:
//! a [`PolicyRegistry`] holding the process's shared state, an
//! [`ExecutorConfig`] resolving per-task-type settings over system-wide
//! defaults, and a [`TaskExecutor`] that assembles the chain in its fixed
//! order and runs handlers under it.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use serde_json::json;
//! use taskguard_core::{HandlerFn, Outcome, TaskInvocation};
//! use taskguard_executor::{ExecutorConfig, PolicyRegistry, TaskExecutor, TaskPolicy};
//!
//! # async fn example() {
//! let config = ExecutorConfig::builder()
//!     .defaults(TaskPolicy::new().max_retries(3))
//!     .task(
//!         "reports.generate",
//!         TaskPolicy::new()
//!             .max_retries(5)
//!             .base_delay(Duration::from_secs(60))
//!             .circuit_breaker("warehouse-db")
//!             .rate_limit(100, Duration::from_secs(60))
//!             .idempotent(Duration::from_secs(3600)),
//!     )
//!     .build();
//!
//! let executor = TaskExecutor::new(config, Arc::new(PolicyRegistry::in_memory()));
//!
//! let handler = Arc::new(HandlerFn::new(|_invocation| async {
//!     Outcome::Success(json!({"rows": 128}))
//! }));
//!
//! let invocation = TaskInvocation::new("reports.generate", json!({"month": "2024-01"}));
//! let result = executor.execute(invocation, handler).await;
//! # let _ = result;
//! # }
//! ```

mod config;
mod executor;
mod registry;
mod timeout;

pub use config::{ExecutorConfig, ExecutorConfigBuilder, TaskPolicy};
pub use executor::TaskExecutor;
pub use registry::PolicyRegistry;
pub use timeout::TimeLimitPolicy;
