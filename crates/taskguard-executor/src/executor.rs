//! The task executor.

use crate::config::{ExecutorConfig, TaskPolicy};
use crate::registry::PolicyRegistry;
use crate::timeout::TimeLimitPolicy;
use std::sync::Arc;
use std::time::SystemTime;
use taskguard_circuitbreaker::CircuitBreakerPolicy;
use taskguard_core::{ExecutionError, Next, Policy, TaskHandler, TaskInvocation, TaskOutput};
use taskguard_deadletter::DeadLetterPolicy;
use taskguard_idempotency::{IdempotencyConfig, IdempotencyGuard, IdempotencyPolicy};
use taskguard_metrics::{MetricsEvent, MetricsPolicy};
use taskguard_ratelimiter::{RateLimiter, RateLimiterConfig, RateLimiterPolicy};
use taskguard_retry::{RetryConfig, RetryPolicy};

/// Runs task handlers under the full policy chain.
///
/// The chain has a fixed nesting order, outermost to innermost:
///
/// 1. **metrics**: wraps everything, so policy rejections are measured too
/// 2. **dead-letter capture**: whatever terminal failure survives the
///    layers below is recorded exactly once
/// 3. **idempotency**: the key is decided before any retries are spent
/// 4. **retry**: drives re-invocation of everything inside it
/// 5. **circuit breaker**: asked for permission on *every* attempt
/// 6. **rate limiter**: admission-checked on *every* attempt
/// 7. **hard timeout**: bounds a single handler attempt
///
/// Circuit-open and rate-limit rejections abort the retry loop and surface
/// to the worker loop; the broker decides whether to requeue.
pub struct TaskExecutor {
    config: ExecutorConfig,
    registry: Arc<PolicyRegistry>,
}

impl TaskExecutor {
    /// Creates an executor over a shared registry.
    ///
    /// Per-task breaker configurations from the config are installed into
    /// the breaker registry here, once, so later handles agree on them.
    pub fn new(config: ExecutorConfig, registry: Arc<PolicyRegistry>) -> Self {
        for policy in config.tasks.values().chain([&config.defaults]) {
            if let Some(binding) = &policy.circuit_breaker {
                if let Some(breaker_config) = &binding.config {
                    registry
                        .breakers()
                        .set_config(&binding.dependency, breaker_config.clone());
                }
            }
        }
        Self { config, registry }
    }

    /// The registry this executor draws shared state from.
    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.registry
    }

    /// Executes one invocation under the policy chain for its task type.
    pub async fn execute(
        &self,
        invocation: TaskInvocation,
        handler: Arc<dyn TaskHandler>,
    ) -> Result<TaskOutput, ExecutionError> {
        let policy = self.config.policy_for(&invocation.task_name);

        let mut invocation = invocation;
        if let Some(soft) = policy.soft_timeout {
            invocation.soft_deadline = Some(SystemTime::now() + soft);
        }

        let chain = self.assemble_chain(policy, &invocation.task_name);
        Next::new(chain, handler).run(invocation).await
    }

    fn assemble_chain(&self, policy: &TaskPolicy, task_name: &str) -> Arc<[Arc<dyn Policy>]> {
        let mut policies: Vec<Arc<dyn Policy>> = Vec::with_capacity(7);

        policies.push(Arc::new(MetricsPolicy::new(self.registry.recorder())));
        policies.push(Arc::new(DeadLetterPolicy::new(self.registry.dead_letters())));

        if let Some(idempotency) = &policy.idempotency {
            let guard = IdempotencyGuard::new(
                IdempotencyConfig::builder()
                    .ttl(idempotency.ttl)
                    .cache_results(idempotency.cache_results)
                    .name(task_name)
                    .build(),
                self.registry.store(),
            );
            policies.push(Arc::new(IdempotencyPolicy::new(guard)));
        }

        let recorder = self.registry.recorder();
        let retried_task = task_name.to_string();
        let retry_config = RetryConfig::builder()
            .max_retries(policy.max_retries)
            .base_delay(policy.base_delay)
            .max_delay(policy.max_delay)
            .backoff_multiplier(policy.backoff_multiplier)
            .jitter_fraction(policy.jitter_fraction)
            .retry_on_timeout(policy.retry_on_timeout)
            .name(task_name)
            .on_retry(move |_attempt, _delay| {
                recorder.record(MetricsEvent::Retried {
                    task_name: retried_task.clone(),
                });
            })
            .build();
        policies.push(Arc::new(RetryPolicy::new(retry_config)));

        if let Some(binding) = &policy.circuit_breaker {
            let breaker = self.registry.breakers().breaker(&binding.dependency);
            policies.push(Arc::new(CircuitBreakerPolicy::new(breaker)));
        }

        if let Some(rate_limit) = &policy.rate_limit {
            let limiter = RateLimiter::new(
                RateLimiterConfig::builder()
                    .calls(rate_limit.calls)
                    .period(rate_limit.period)
                    .name(task_name)
                    .build(),
                self.registry.store(),
            );
            let key = rate_limit
                .key
                .clone()
                .unwrap_or_else(|| task_name.to_string());
            policies.push(Arc::new(RateLimiterPolicy::new(limiter, key)));
        }

        if let Some(hard) = policy.hard_timeout {
            policies.push(Arc::new(TimeLimitPolicy::new(hard)));
        }

        Arc::from(policies)
    }
}
