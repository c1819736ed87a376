//! Per-key rate limiting for taskguard.
//!
//! A sliding-window admission test over the shared store: at most `calls`
//! admitted calls per rolling `period` per key, counted across every worker.
//! Rejected calls surface
//! [`ExecutionError::RateLimited`](taskguard_core::ExecutionError::RateLimited)
//! to the caller; dropping, delaying, or requeueing is the broker's
//! decision, not this layer's.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskguard_core::InMemoryStateStore;
//! use taskguard_ratelimiter::{RateLimiter, RateLimiterConfig};
//!
//! # async fn example() {
//! let config = RateLimiterConfig::builder()
//!     .calls(100)
//!     .period(Duration::from_secs(60))
//!     .build();
//! let limiter = RateLimiter::new(config, Arc::new(InMemoryStateStore::new()));
//!
//! if limiter.allow("reports.generate").await.is_ok() {
//!     // run the task
//! }
//! # }
//! ```

mod config;
mod events;
mod limiter;

pub use config::{RateLimiterConfig, RateLimiterConfigBuilder};
pub use events::RateLimiterEvent;
pub use limiter::RateLimiter;

use futures::future::BoxFuture;
use taskguard_core::{ExecutionError, Next, Policy, TaskInvocation, TaskOutput};

/// Policy that gates the inner chain behind per-key admission.
///
/// The key is fixed when the executor assembles the chain (the task name by
/// default), so every retry attempt of that task checks the same window.
pub struct RateLimiterPolicy {
    limiter: RateLimiter,
    key: String,
}

impl RateLimiterPolicy {
    /// Wraps a limiter with the admission key to check.
    pub fn new(limiter: RateLimiter, key: impl Into<String>) -> Self {
        Self {
            limiter,
            key: key.into(),
        }
    }
}

impl Policy for RateLimiterPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let limiter = self.limiter.clone();
        let key = self.key.clone();
        Box::pin(async move {
            limiter.allow(&key).await?;
            next.run(invocation).await
        })
    }
}
