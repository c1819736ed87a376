//! Backoff strategies.
//!
//! A backoff strategy is a pure function from the retry index to a delay.
//! The exponential strategy applies proportional jitter so workers that
//! failed together do not retry together.

use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

/// Strategy producing the delay before retry `attempt` (0-indexed: the delay
/// after the first failure is `delay_for(0)`).
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay for one retry attempt.
    fn delay_for(&self, attempt: u32) -> Duration;
}

/// The same delay before every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    interval: Duration,
}

impl FixedInterval {
    /// Creates a fixed-interval strategy.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl IntervalFunction for FixedInterval {
    fn delay_for(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

/// Exponential backoff with a cap and proportional jitter.
///
/// The un-jittered delay is `base_delay * multiplier^attempt`, capped at
/// `max_delay`. When `jitter_fraction` is non-zero the final delay is spread
/// uniformly over `raw * (1 - jitter_fraction) ..= raw * (1 + jitter_fraction)`
/// and clamped back to `max_delay`, so the cap holds with jitter applied.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter_fraction: f64,
}

impl ExponentialBackoff {
    /// Creates an exponential strategy.
    ///
    /// Defaults: multiplier 2.0, max_delay 1 hour, no jitter.
    pub fn new(base_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay: Duration::from_secs(3600),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        }
    }

    /// Sets the growth factor between consecutive delays.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the upper bound no delay will exceed.
    pub fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Sets the jitter fraction (0.1 spreads each delay by ±10%).
    ///
    /// Values are clamped to `0.0..=1.0`.
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// The delay before jitter, capped at `max_delay`.
    pub fn raw_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
            Duration::from_secs_f64(secs)
        } else {
            self.max_delay
        }
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.raw_delay(attempt);
        if self.jitter_fraction == 0.0 {
            return raw;
        }
        let offset = rand::rng().random_range(-self.jitter_fraction..=self.jitter_fraction);
        let jittered = raw.as_secs_f64() * (1.0 + offset);
        Duration::from_secs_f64(jittered.max(0.0)).min(self.max_delay)
    }
}

/// A strategy backed by a closure.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    /// Wraps a closure as an interval function.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(u32) -> Duration + Send + Sync,
{
    fn delay_for(&self, attempt: u32) -> Duration {
        (self.f)(attempt)
    }
}

/// Shared handle to a strategy.
pub type SharedInterval = Arc<dyn IntervalFunction>;
