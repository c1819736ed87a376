//! Execute-once guarantees under contention and crash recovery.

use std::sync::Arc;
use std::time::Duration;
use taskguard_core::{InMemoryStateStore, SharedStateStore};
use taskguard_idempotency::{Acquire, IdempotencyConfig, IdempotencyGuard, Release};

fn guard_over(store: Arc<dyn SharedStateStore>, ttl: Duration) -> IdempotencyGuard {
    IdempotencyGuard::new(IdempotencyConfig::builder().ttl(ttl).build(), store)
}

#[tokio::test]
async fn two_workers_racing_one_key_get_one_acquire_and_one_in_progress() {
    let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());
    let worker_a = guard_over(Arc::clone(&store), Duration::from_secs(60));
    let worker_b = guard_over(store, Duration::from_secs(60));

    let (a, b) = tokio::join!(worker_a.acquire("job-42"), worker_b.acquire("job-42"));
    let a = a.unwrap();
    let b = b.unwrap();

    let acquired = [&a, &b]
        .iter()
        .filter(|outcome| matches!(outcome, Acquire::Acquired))
        .count();
    let blocked = [&a, &b]
        .iter()
        .filter(|outcome| matches!(outcome, Acquire::AlreadyInProgress))
        .count();

    assert_eq!(acquired, 1);
    assert_eq!(blocked, 1);
}

#[tokio::test]
async fn ttl_expiry_frees_a_key_that_was_never_released() {
    let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());
    let crashed_worker = guard_over(Arc::clone(&store), Duration::from_millis(40));
    let healthy_worker = guard_over(store, Duration::from_millis(40));

    // The "crashed" worker acquires and never releases.
    assert!(matches!(
        crashed_worker.acquire("job-42").await.unwrap(),
        Acquire::Acquired
    ));
    assert!(matches!(
        healthy_worker.acquire("job-42").await.unwrap(),
        Acquire::AlreadyInProgress
    ));

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(matches!(
        healthy_worker.acquire("job-42").await.unwrap(),
        Acquire::Acquired
    ));
}

#[tokio::test]
async fn completion_is_visible_to_other_workers() {
    let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());
    let worker_a = guard_over(Arc::clone(&store), Duration::from_secs(60));
    let worker_b = guard_over(store, Duration::from_secs(60));

    worker_a.acquire("job-42").await.unwrap();
    worker_a
        .release("job-42", Release::Completed(Some(serde_json::json!(99))))
        .await
        .unwrap();

    match worker_b.acquire("job-42").await.unwrap() {
        Acquire::AlreadyCompleted { result } => {
            assert_eq!(result, Some(serde_json::json!(99)));
        }
        other => panic!("unexpected acquire: {other:?}"),
    }
}

#[tokio::test]
async fn many_racing_workers_still_yield_a_single_winner() {
    let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());

    let mut handles = Vec::new();
    for _ in 0..32 {
        let guard = guard_over(Arc::clone(&store), Duration::from_secs(60));
        handles.push(tokio::spawn(async move {
            matches!(guard.acquire("job-42").await.unwrap(), Acquire::Acquired)
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}
