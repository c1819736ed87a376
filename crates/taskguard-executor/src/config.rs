//! Per-task-type policy configuration.
//!
//! Every option is overridable per task type, with system-wide defaults for
//! everything else: the executor resolves the [`TaskPolicy`] for an
//! invocation by task name and assembles the chain from it.

use std::collections::HashMap;
use std::time::Duration;
use taskguard_circuitbreaker::CircuitBreakerConfig;

/// Circuit breaker attachment for one task type.
#[derive(Clone)]
pub(crate) struct CircuitBinding {
    pub(crate) dependency: String,
    pub(crate) config: Option<CircuitBreakerConfig>,
}

/// Rate limit attachment for one task type.
#[derive(Clone)]
pub(crate) struct RateLimitBinding {
    pub(crate) calls: usize,
    pub(crate) period: Duration,
    pub(crate) key: Option<String>,
}

/// Idempotency attachment for one task type.
#[derive(Clone)]
pub(crate) struct IdempotencyBinding {
    pub(crate) ttl: Duration,
    pub(crate) cache_results: bool,
}

/// Reliability settings for one task type (or the system-wide defaults).
#[derive(Clone)]
pub struct TaskPolicy {
    pub(crate) max_retries: u32,
    pub(crate) base_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) backoff_multiplier: f64,
    pub(crate) jitter_fraction: f64,
    pub(crate) retry_on_timeout: bool,
    pub(crate) circuit_breaker: Option<CircuitBinding>,
    pub(crate) rate_limit: Option<RateLimitBinding>,
    pub(crate) idempotency: Option<IdempotencyBinding>,
    pub(crate) soft_timeout: Option<Duration>,
    pub(crate) hard_timeout: Option<Duration>,
}

impl Default for TaskPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskPolicy {
    /// Creates a policy with the system defaults.
    ///
    /// Defaults:
    /// - max_retries: 3
    /// - base_delay: 1 second, max_delay: 1 hour
    /// - backoff_multiplier: 2.0, jitter_fraction: 0.1
    /// - retry_on_timeout: true
    /// - no circuit breaker, rate limit, idempotency, or timeouts
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3600),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
            retry_on_timeout: true,
            circuit_breaker: None,
            rate_limit: None,
            idempotency: None,
            soft_timeout: None,
            hard_timeout: None,
        }
    }

    /// Sets the maximum number of retries after the initial attempt.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound no backoff delay will exceed.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction applied to each delay.
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction;
        self
    }

    /// Controls whether timeout failures are retried.
    pub fn retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Gates this task type behind the named dependency's circuit breaker,
    /// using the breaker registry's configuration for that name.
    pub fn circuit_breaker<S: Into<String>>(mut self, dependency: S) -> Self {
        self.circuit_breaker = Some(CircuitBinding {
            dependency: dependency.into(),
            config: None,
        });
        self
    }

    /// Gates this task type behind the named dependency's circuit breaker
    /// with explicit breaker configuration.
    pub fn circuit_breaker_with<S: Into<String>>(
        mut self,
        dependency: S,
        config: CircuitBreakerConfig,
    ) -> Self {
        self.circuit_breaker = Some(CircuitBinding {
            dependency: dependency.into(),
            config: Some(config),
        });
        self
    }

    /// Caps this task type at `calls` admitted executions per rolling
    /// `period` (keyed by task name unless [`rate_limit_key`] overrides it).
    ///
    /// [`rate_limit_key`]: TaskPolicy::rate_limit_key
    pub fn rate_limit(mut self, calls: usize, period: Duration) -> Self {
        self.rate_limit = Some(RateLimitBinding {
            calls,
            period,
            key: None,
        });
        self
    }

    /// Overrides the admission key used by the rate limit.
    pub fn rate_limit_key<S: Into<String>>(mut self, key: S) -> Self {
        if let Some(rate_limit) = &mut self.rate_limit {
            rate_limit.key = Some(key.into());
        }
        self
    }

    /// Enforces execute-once semantics for this task type within `ttl`.
    pub fn idempotent(mut self, ttl: Duration) -> Self {
        self.idempotency = Some(IdempotencyBinding {
            ttl,
            cache_results: true,
        });
        self
    }

    /// Controls whether completed idempotent executions cache their result.
    pub fn cache_results(mut self, cache: bool) -> Self {
        if let Some(idempotency) = &mut self.idempotency {
            idempotency.cache_results = cache;
        }
        self
    }

    /// Sets the cooperative deadline published to handlers.
    pub fn soft_timeout(mut self, timeout: Duration) -> Self {
        self.soft_timeout = Some(timeout);
        self
    }

    /// Sets the hard deadline after which the attempt is cancelled and
    /// treated as a (transient) timeout failure.
    pub fn hard_timeout(mut self, timeout: Duration) -> Self {
        self.hard_timeout = Some(timeout);
        self
    }
}

/// System-wide defaults plus per-task-type overrides.
#[derive(Clone, Default)]
pub struct ExecutorConfig {
    pub(crate) defaults: TaskPolicy,
    pub(crate) tasks: HashMap<String, TaskPolicy>,
}

impl ExecutorConfig {
    /// Creates a configuration builder.
    pub fn builder() -> ExecutorConfigBuilder {
        ExecutorConfigBuilder::new()
    }

    /// The policy governing `task_name`.
    pub(crate) fn policy_for(&self, task_name: &str) -> &TaskPolicy {
        self.tasks.get(task_name).unwrap_or(&self.defaults)
    }
}

/// Builder for [`ExecutorConfig`].
#[derive(Default)]
pub struct ExecutorConfigBuilder {
    defaults: TaskPolicy,
    tasks: HashMap<String, TaskPolicy>,
}

impl ExecutorConfigBuilder {
    /// Creates a builder with default policies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the system-wide default policy.
    pub fn defaults(mut self, policy: TaskPolicy) -> Self {
        self.defaults = policy;
        self
    }

    /// Attaches a policy to one task type.
    pub fn task<S: Into<String>>(mut self, task_name: S, policy: TaskPolicy) -> Self {
        self.tasks.insert(task_name.into(), policy);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ExecutorConfig {
        ExecutorConfig {
            defaults: self.defaults,
            tasks: self.tasks,
        }
    }
}
