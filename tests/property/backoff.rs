//! Backoff invariants over random policies.

use proptest::prelude::*;
use std::time::Duration;
use taskguard_retry::{ExponentialBackoff, IntervalFunction};

proptest! {
    /// No delay ever exceeds the configured cap, jitter included.
    #[test]
    fn delay_never_exceeds_max_delay(
        base_ms in 1u64..10_000,
        max_ms in 1u64..600_000,
        multiplier in 1.0f64..8.0,
        jitter in 0.0f64..1.0,
        attempt in 0u32..64,
    ) {
        let backoff = ExponentialBackoff::new(Duration::from_millis(base_ms))
            .max_delay(Duration::from_millis(max_ms))
            .multiplier(multiplier)
            .jitter_fraction(jitter);

        prop_assert!(backoff.delay_for(attempt) <= Duration::from_millis(max_ms));
    }

    /// Without jitter the schedule is non-decreasing in the attempt index.
    #[test]
    fn unjittered_delays_are_non_decreasing(
        base_ms in 1u64..10_000,
        multiplier in 1.0f64..8.0,
        attempt in 0u32..32,
    ) {
        let backoff = ExponentialBackoff::new(Duration::from_millis(base_ms))
            .multiplier(multiplier);

        prop_assert!(backoff.delay_for(attempt) <= backoff.delay_for(attempt + 1));
    }

    /// Jitter spreads delays around the raw value, never outside the band.
    #[test]
    fn jitter_stays_in_band(
        base_ms in 100u64..10_000,
        jitter in 0.0f64..0.9,
        attempt in 0u32..8,
    ) {
        let backoff = ExponentialBackoff::new(Duration::from_millis(base_ms))
            .jitter_fraction(jitter);
        let raw = backoff.raw_delay(attempt);

        let delay = backoff.delay_for(attempt);
        let low = raw.as_secs_f64() * (1.0 - jitter) - 1e-6;
        let high = raw.as_secs_f64() * (1.0 + jitter) + 1e-6;
        prop_assert!(delay.as_secs_f64() >= low);
        prop_assert!(delay.as_secs_f64() <= high);
    }
}
