//! The breaker state machine.
//!
//! Transitions are pure functions over a serializable snapshot. The
//! [`CircuitBreaker`](crate::CircuitBreaker) applies them with
//! compare-and-swap against the shared store, so two workers observing the
//! same dependency never interleave half-applied transitions.

use crate::config::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};

/// Represents the state of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Calls pass through; consecutive failures are counted.
    Closed,
    /// Calls are rejected until the reset timeout elapses.
    Open,
    /// A bounded number of probe calls test whether the dependency recovered.
    HalfOpen,
}

/// Whether an acquire attempt may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AcquireDecision {
    Permitted,
    Rejected,
}

/// Serialized breaker state as stored under `cb:{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    /// Current state of the breaker.
    pub state: CircuitState,
    /// Failures seen in a row while closed.
    pub consecutive_failures: u32,
    /// Unix-millis timestamp of the most recent recorded failure.
    pub last_failure_at: Option<u64>,
    /// Unix-millis timestamp of the most recent transition to open.
    pub opened_at: Option<u64>,
    /// Successful probes seen since entering half-open.
    pub half_open_successes: u32,
    /// Probes admitted since entering half-open.
    pub half_open_probes: u32,
}

impl Default for BreakerSnapshot {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            opened_at: None,
            half_open_successes: 0,
            half_open_probes: 0,
        }
    }
}

impl BreakerSnapshot {
    /// Decides whether a call may proceed, producing the follow-up snapshot.
    pub(crate) fn on_acquire(
        &self,
        now_millis: u64,
        config: &CircuitBreakerConfig,
    ) -> (Self, AcquireDecision) {
        match self.state {
            CircuitState::Closed => (self.clone(), AcquireDecision::Permitted),
            CircuitState::Open => {
                let reset_at = self
                    .opened_at
                    .unwrap_or(0)
                    .saturating_add(config.reset_timeout.as_millis() as u64);
                if now_millis >= reset_at {
                    // The first call past the timeout becomes the probe.
                    let next = Self {
                        state: CircuitState::HalfOpen,
                        half_open_successes: 0,
                        half_open_probes: 1,
                        ..self.clone()
                    };
                    (next, AcquireDecision::Permitted)
                } else {
                    (self.clone(), AcquireDecision::Rejected)
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_probes < config.half_open_success_needed {
                    let next = Self {
                        half_open_probes: self.half_open_probes + 1,
                        ..self.clone()
                    };
                    (next, AcquireDecision::Permitted)
                } else {
                    (self.clone(), AcquireDecision::Rejected)
                }
            }
        }
    }

    /// Applies a successful call result.
    pub(crate) fn on_success(&self, config: &CircuitBreakerConfig) -> Self {
        match self.state {
            CircuitState::Closed => Self {
                consecutive_failures: 0,
                ..self.clone()
            },
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes + 1;
                if successes >= config.half_open_success_needed {
                    Self::default()
                } else {
                    Self {
                        half_open_successes: successes,
                        ..self.clone()
                    }
                }
            }
            // A late probe result after another worker re-opened; ignore.
            CircuitState::Open => self.clone(),
        }
    }

    /// Applies a failed call result.
    pub(crate) fn on_failure(&self, now_millis: u64, config: &CircuitBreakerConfig) -> Self {
        match self.state {
            CircuitState::Closed => {
                let failures = self.consecutive_failures + 1;
                if failures >= config.failure_threshold {
                    Self {
                        state: CircuitState::Open,
                        consecutive_failures: failures,
                        last_failure_at: Some(now_millis),
                        opened_at: Some(now_millis),
                        half_open_successes: 0,
                        half_open_probes: 0,
                    }
                } else {
                    Self {
                        consecutive_failures: failures,
                        last_failure_at: Some(now_millis),
                        ..self.clone()
                    }
                }
            }
            CircuitState::HalfOpen => Self {
                state: CircuitState::Open,
                consecutive_failures: self.consecutive_failures,
                last_failure_at: Some(now_millis),
                opened_at: Some(now_millis),
                half_open_successes: 0,
                half_open_probes: 0,
            },
            CircuitState::Open => Self {
                last_failure_at: Some(now_millis),
                ..self.clone()
            },
        }
    }

    /// A snapshot forced into the open state.
    pub(crate) fn forced_open(now_millis: u64) -> Self {
        Self {
            state: CircuitState::Open,
            opened_at: Some(now_millis),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn config() -> CircuitBreakerConfig {
        CircuitBreakerConfig::builder()
            .failure_threshold(3)
            .reset_timeout(Duration::from_secs(60))
            .half_open_success_needed(2)
            .build()
    }

    #[test]
    fn threshold_failures_open_the_breaker() {
        let config = config();
        let mut snapshot = BreakerSnapshot::default();
        snapshot = snapshot.on_failure(1_000, &config);
        snapshot = snapshot.on_failure(2_000, &config);
        assert_eq!(snapshot.state, CircuitState::Closed);

        snapshot = snapshot.on_failure(3_000, &config);
        assert_eq!(snapshot.state, CircuitState::Open);
        assert_eq!(snapshot.opened_at, Some(3_000));
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let config = config();
        let mut snapshot = BreakerSnapshot::default();
        snapshot = snapshot.on_failure(1_000, &config);
        snapshot = snapshot.on_failure(2_000, &config);
        snapshot = snapshot.on_success(&config);
        assert_eq!(snapshot.consecutive_failures, 0);

        // The streak must start over.
        snapshot = snapshot.on_failure(3_000, &config);
        assert_eq!(snapshot.state, CircuitState::Closed);
    }

    #[test]
    fn open_rejects_until_the_reset_timeout() {
        let config = config();
        let snapshot = BreakerSnapshot::forced_open(10_000);

        let (_, decision) = snapshot.on_acquire(10_000 + 59_999, &config);
        assert_eq!(decision, AcquireDecision::Rejected);

        let (next, decision) = snapshot.on_acquire(10_000 + 60_000, &config);
        assert_eq!(decision, AcquireDecision::Permitted);
        assert_eq!(next.state, CircuitState::HalfOpen);
        assert_eq!(next.half_open_probes, 1);
    }

    #[test]
    fn half_open_bounds_outstanding_probes() {
        let config = config();
        let snapshot = BreakerSnapshot::forced_open(0);
        let (half_open, _) = snapshot.on_acquire(60_000, &config);

        // One probe already admitted by the transition; one more is allowed.
        let (second, decision) = half_open.on_acquire(60_001, &config);
        assert_eq!(decision, AcquireDecision::Permitted);

        let (_, decision) = second.on_acquire(60_002, &config);
        assert_eq!(decision, AcquireDecision::Rejected);
    }

    #[test]
    fn needed_successes_close_the_breaker() {
        let config = config();
        let snapshot = BreakerSnapshot::forced_open(0);
        let (half_open, _) = snapshot.on_acquire(60_000, &config);

        let after_one = half_open.on_success(&config);
        assert_eq!(after_one.state, CircuitState::HalfOpen);

        let closed = after_one.on_success(&config);
        assert_eq!(closed.state, CircuitState::Closed);
        assert_eq!(closed.consecutive_failures, 0);
    }

    #[test]
    fn half_open_failure_reopens_and_resets_opened_at() {
        let config = config();
        let snapshot = BreakerSnapshot::forced_open(0);
        let (half_open, _) = snapshot.on_acquire(60_000, &config);

        let reopened = half_open.on_failure(61_000, &config);
        assert_eq!(reopened.state, CircuitState::Open);
        assert_eq!(reopened.opened_at, Some(61_000));
        assert_eq!(reopened.half_open_probes, 0);
    }
}
