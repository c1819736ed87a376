//! Admission invariants over random limits.

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use taskguard_core::InMemoryStateStore;
use taskguard_ratelimiter::{RateLimiter, RateLimiterConfig};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Exactly `limit` calls are admitted inside one window.
    #[test]
    fn admits_exactly_the_limit(limit in 1usize..50) {
        runtime().block_on(async move {
            let limiter = RateLimiter::new(
                RateLimiterConfig::builder()
                    .calls(limit)
                    .period(Duration::from_secs(60))
                    .build(),
                Arc::new(InMemoryStateStore::new()),
            );

            for _ in 0..limit {
                prop_assert!(limiter.allow("k").await.is_ok());
            }
            prop_assert!(limiter.allow("k").await.is_err());
            prop_assert_eq!(limiter.admitted_in_window("k").await.unwrap(), limit);
            Ok(())
        })?;
    }

    /// Admission under one key never leaks into another.
    #[test]
    fn keys_are_isolated(limit in 1usize..20) {
        runtime().block_on(async move {
            let limiter = RateLimiter::new(
                RateLimiterConfig::builder()
                    .calls(limit)
                    .period(Duration::from_secs(60))
                    .build(),
                Arc::new(InMemoryStateStore::new()),
            );

            for _ in 0..limit {
                limiter.allow("a").await.unwrap();
            }
            prop_assert!(limiter.allow("a").await.is_err());
            prop_assert!(limiter.allow("b").await.is_ok());
            Ok(())
        })?;
    }
}
