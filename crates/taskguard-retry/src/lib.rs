//! Bounded retry with backoff for taskguard.
//!
//! The retry policy re-runs the *inner* chain, not just the handler, so a
//! circuit breaker or rate limiter placed inside it gates every attempt
//! individually. Only transient failures are retried; permanent failures,
//! circuit-open and rate-limit rejections, and duplicate-execution signals
//! are surfaced immediately.
//!
//! # Examples
//!
//! ```
//! use taskguard_retry::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::builder()
//!     .max_retries(5)
//!     .base_delay(Duration::from_millis(100))
//!     .jitter_fraction(0.1)
//!     .on_retry(|attempt, delay| {
//!         println!("retry {attempt} after {delay:?}");
//!     })
//!     .build();
//! let policy = taskguard_retry::RetryPolicy::new(config);
//! ```

mod backoff;
mod config;
mod events;

pub use backoff::{ExponentialBackoff, FixedInterval, FnInterval, IntervalFunction, SharedInterval};
pub use config::{RetryConfig, RetryConfigBuilder};
pub use events::RetryEvent;

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Instant;
use taskguard_core::{ExecutionError, Next, Policy, TaskErrorKind, TaskInvocation, TaskOutput};

/// Policy that retries transient failures with backoff.
pub struct RetryPolicy {
    config: Arc<RetryConfig>,
}

impl RetryPolicy {
    /// Creates a retry policy from its configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

}

/// Shared-store failures count as transient; everything that is not a
/// handler failure aborts the loop.
fn is_retryable(error: &ExecutionError, retry_on_timeout: bool) -> bool {
    match error {
        ExecutionError::Transient(task_error) => {
            task_error.kind != TaskErrorKind::Timeout || retry_on_timeout
        }
        ExecutionError::Store(_) => true,
        _ => false,
    }
}

impl Policy for RetryPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let mut retries = 0u32;

            loop {
                match next.clone().run(invocation.clone()).await {
                    Ok(output) => {
                        config.event_listeners.emit(&RetryEvent::Success {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: retries + 1,
                        });
                        return Ok(output);
                    }
                    Err(error) => {
                        if !is_retryable(&error, config.retry_on_timeout) {
                            config.event_listeners.emit(&RetryEvent::IgnoredError {
                                policy_name: config.name.clone(),
                                timestamp: Instant::now(),
                            });
                            return Err(error);
                        }

                        if retries >= config.max_retries {
                            config.event_listeners.emit(&RetryEvent::Exhausted {
                                policy_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts: retries + 1,
                            });
                            #[cfg(feature = "tracing")]
                            tracing::debug!(
                                task = %invocation.task_name,
                                attempts = retries + 1,
                                "retries exhausted"
                            );
                            return Err(error);
                        }

                        let delay = config.interval.delay_for(retries);
                        config.event_listeners.emit(&RetryEvent::Retry {
                            policy_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt: retries + 1,
                            delay,
                        });
                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            task = %invocation.task_name,
                            attempt = retries + 1,
                            ?delay,
                            "retrying after backoff"
                        );

                        tokio::time::sleep(delay).await;
                        retries += 1;
                        invocation.record_attempt();
                    }
                }
            }
        })
    }
}
