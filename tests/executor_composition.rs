//! Integration tests for the composed policy chain.
//!
//! These exercise the documented nesting order end to end: metrics outside
//! everything, dead-letter capture around the retry loop, idempotency
//! decided once per delivery, and circuit breaker / rate limiter gating
//! every individual attempt.

use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use taskguard_circuitbreaker::CircuitBreakerConfig;
use taskguard_core::{
    ExecutionError, HandlerFn, Outcome, TaskError, TaskHandler, TaskInvocation,
};
use taskguard_deadletter::DeadLetterFilter;
use taskguard_executor::{ExecutorConfig, PolicyRegistry, TaskExecutor, TaskPolicy};

fn counting_failing_handler(calls: &Arc<AtomicUsize>) -> Arc<dyn TaskHandler> {
    let counter = Arc::clone(calls);
    Arc::new(HandlerFn::new(move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::Transient(TaskError::transient("dependency down"))
        }
    }))
}

fn fast_retries(policy: TaskPolicy) -> TaskPolicy {
    policy.base_delay(Duration::from_millis(1)).jitter_fraction(0.0)
}

#[tokio::test]
async fn circuit_breaker_gates_every_retry_attempt() {
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(5)).circuit_breaker_with(
                    "flaky-dep",
                    CircuitBreakerConfig::builder().failure_threshold(2).build(),
                ),
            )
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let result = executor
        .execute(
            TaskInvocation::new("demo", json!(null)),
            counting_failing_handler(&calls),
        )
        .await;

    // Two failures trip the breaker; the third attempt is rejected before
    // reaching the handler and the rejection is not retried.
    assert!(matches!(result, Err(ExecutionError::CircuitOpen { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn circuit_open_rejections_do_not_dead_letter() {
    let registry = Arc::new(PolicyRegistry::in_memory());
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(1)).circuit_breaker_with(
                    "dep",
                    CircuitBreakerConfig::builder().failure_threshold(2).build(),
                ),
            )
            .build(),
        registry,
    );

    // Both attempts fail: retries exhaust exactly as the second failure
    // trips the breaker.
    let calls = Arc::new(AtomicUsize::new(0));
    let result = executor
        .execute(
            TaskInvocation::new("first", json!(null)),
            counting_failing_handler(&calls),
        )
        .await;
    assert!(matches!(result, Err(ExecutionError::Transient(_))));

    // The breaker is now open; this delivery's handler never runs.
    let calls_second = Arc::new(AtomicUsize::new(0));
    let result = executor
        .execute(
            TaskInvocation::new("second", json!(null)),
            counting_failing_handler(&calls_second),
        )
        .await;
    assert!(matches!(result, Err(ExecutionError::CircuitOpen { .. })));
    assert_eq!(calls_second.load(Ordering::SeqCst), 0);

    // Only the first delivery (a real handler failure) left a record.
    let records = executor
        .registry()
        .dead_letters()
        .list(&DeadLetterFilter::all())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].task_name, "first");
}

#[tokio::test]
async fn rate_limit_rejections_surface_without_retry_or_dead_letter() {
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(3))
                    .rate_limit(1, Duration::from_secs(60)),
            )
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    );

    let ok = Arc::new(HandlerFn::new(|_| async { Outcome::done() }));
    executor
        .execute(TaskInvocation::new("demo", json!(null)), ok.clone())
        .await
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let result = executor
        .execute(
            TaskInvocation::new("demo", json!(null)),
            counting_failing_handler(&calls),
        )
        .await;

    assert!(matches!(result, Err(ExecutionError::RateLimited { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(executor
        .registry()
        .dead_letters()
        .list(&DeadLetterFilter::all())
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn permanent_failures_skip_retries_and_dead_letter_immediately() {
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(fast_retries(TaskPolicy::new().max_retries(5)))
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = Arc::new(HandlerFn::new(move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::Permanent(TaskError::permanent("unparseable payload"))
        }
    }));

    let result = executor
        .execute(TaskInvocation::new("demo", json!(null)), handler)
        .await;

    assert!(matches!(result, Err(ExecutionError::Permanent(_))));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let records = executor
        .registry()
        .dead_letters()
        .list(&DeadLetterFilter::all())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].retry_count, 0);
}

#[tokio::test]
async fn duplicate_delivery_is_skipped_with_the_cached_result() {
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(0))
                    .idempotent(Duration::from_secs(60)),
            )
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = Arc::new(HandlerFn::new(move |_| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Outcome::Success(json!("computed-once"))
        }
    }));

    let first = executor
        .execute(TaskInvocation::new("demo", json!({"id": 7})), handler.clone())
        .await
        .unwrap();
    // A different delivery of the same signature.
    let second = executor
        .execute(TaskInvocation::new("demo", json!({"id": 7})), handler)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn in_flight_duplicates_are_rejected_not_queued() {
    let executor = Arc::new(TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(0))
                    .idempotent(Duration::from_secs(60)),
            )
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    ));

    let handler = Arc::new(HandlerFn::new(|_| async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Outcome::done()
    }));

    let slow = {
        let executor = Arc::clone(&executor);
        let handler = handler.clone();
        tokio::spawn(async move {
            executor
                .execute(TaskInvocation::new("demo", json!({"id": 1})), handler)
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let duplicate = executor
        .execute(TaskInvocation::new("demo", json!({"id": 1})), handler)
        .await;
    assert!(matches!(
        duplicate,
        Err(ExecutionError::Duplicate {
            in_progress: true,
            ..
        })
    ));

    assert!(slow.await.unwrap().is_ok());
}

#[tokio::test]
async fn hard_timeouts_are_retried_as_transient_failures() {
    let executor = TaskExecutor::new(
        ExecutorConfig::builder()
            .defaults(
                fast_retries(TaskPolicy::new().max_retries(2))
                    .hard_timeout(Duration::from_millis(20)),
            )
            .build(),
        Arc::new(PolicyRegistry::in_memory()),
    );

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let handler = Arc::new(HandlerFn::new(move |_| {
        let counter = Arc::clone(&counter);
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
            Outcome::done()
        }
    }));

    let result = executor
        .execute(TaskInvocation::new("demo", json!(null)), handler)
        .await;

    // Two timed-out attempts, then a fast one that succeeds.
    assert!(result.is_ok());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}
