//! Breaker invariants over random thresholds.

use proptest::prelude::*;
use std::sync::Arc;
use taskguard_circuitbreaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use taskguard_core::InMemoryStateStore;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// The breaker opens on exactly the configured failure, never before.
    #[test]
    fn opens_exactly_at_the_threshold(threshold in 1u32..20) {
        runtime().block_on(async move {
            let breaker = CircuitBreaker::new(
                "dep",
                CircuitBreakerConfig::builder()
                    .failure_threshold(threshold)
                    .build(),
                Arc::new(InMemoryStateStore::new()),
            );

            for _ in 0..threshold - 1 {
                breaker.record_failure().await.unwrap();
            }
            prop_assert_eq!(
                breaker.snapshot().await.unwrap().state,
                CircuitState::Closed
            );

            breaker.record_failure().await.unwrap();
            prop_assert_eq!(
                breaker.snapshot().await.unwrap().state,
                CircuitState::Open
            );
            Ok(())
        })?;
    }

    /// A success anywhere in the streak restarts the count.
    #[test]
    fn success_restarts_the_streak(threshold in 2u32..20) {
        runtime().block_on(async move {
            let breaker = CircuitBreaker::new(
                "dep",
                CircuitBreakerConfig::builder()
                    .failure_threshold(threshold)
                    .build(),
                Arc::new(InMemoryStateStore::new()),
            );

            for _ in 0..threshold - 1 {
                breaker.record_failure().await.unwrap();
            }
            breaker.record_success().await.unwrap();
            for _ in 0..threshold - 1 {
                breaker.record_failure().await.unwrap();
            }

            prop_assert_eq!(
                breaker.snapshot().await.unwrap().state,
                CircuitState::Closed
            );
            Ok(())
        })?;
    }
}
