//! Per-dependency circuit breaking for taskguard.
//!
//! A circuit breaker stops calling a dependency that keeps failing, so a
//! struggling downstream system gets room to recover instead of a retry
//! storm.
//!
//! ## States
//! - **Closed**: calls pass through; consecutive failures are counted and
//!   reaching `failure_threshold` opens the circuit.
//! - **Open**: calls fail immediately with
//!   [`ExecutionError::CircuitOpen`](taskguard_core::ExecutionError::CircuitOpen);
//!   the wrapped chain is never run. After `reset_timeout` the next call is
//!   admitted as a probe.
//! - **HalfOpen**: a bounded number of probes test recovery. One failure
//!   re-opens the circuit; `half_open_success_needed` consecutive successes
//!   close it.
//!
//! Breaker state lives in the [`SharedStateStore`], one snapshot per
//! dependency name, and every transition is applied with compare-and-swap.
//! Workers sharing a name therefore agree on the state without any
//! cross-process locking: a lost race is simply re-applied against the
//! winner's snapshot.
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use taskguard_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
//! use taskguard_core::InMemoryStateStore;
//!
//! let store = Arc::new(InMemoryStateStore::new());
//! let defaults = CircuitBreakerConfig::builder()
//!     .failure_threshold(5)
//!     .reset_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let registry = CircuitBreakerRegistry::new(store, defaults);
//! let breaker = registry.breaker("billing-api");
//! ```

mod config;
mod events;
mod registry;
mod state;

pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
pub use events::CircuitBreakerEvent;
pub use registry::CircuitBreakerRegistry;
pub use state::{BreakerSnapshot, CircuitState};

use crate::state::AcquireDecision;
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use taskguard_core::store::{decode_state, encode_state};
use taskguard_core::{
    ExecutionError, Next, Policy, SharedStateStore, StoreError, TaskInvocation, TaskOutput,
};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Handle to one named breaker backed by the shared store.
#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    key: String,
    config: Arc<CircuitBreakerConfig>,
    store: Arc<dyn SharedStateStore>,
}

impl CircuitBreaker {
    /// Creates a breaker for `name` with the given configuration.
    pub fn new(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        store: Arc<dyn SharedStateStore>,
    ) -> Self {
        Self::with_shared_config(name, Arc::new(config), store)
    }

    pub(crate) fn with_shared_config(
        name: impl Into<String>,
        config: Arc<CircuitBreakerConfig>,
        store: Arc<dyn SharedStateStore>,
    ) -> Self {
        let name = name.into();
        let key = format!("cb:{name}");
        Self {
            name,
            key,
            config,
            store,
        }
    }

    /// The dependency name this breaker tracks.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reads the current state snapshot.
    pub async fn snapshot(&self) -> Result<BreakerSnapshot, StoreError> {
        match self.store.get(&self.key).await? {
            Some(bytes) => decode_state(&bytes),
            None => Ok(BreakerSnapshot::default()),
        }
    }

    /// Applies `apply` to the stored snapshot with a compare-and-swap loop.
    ///
    /// Returns the snapshot the transition was computed from, the snapshot
    /// written, and the payload produced by `apply`.
    async fn transition<T, F>(
        &self,
        apply: F,
    ) -> Result<(BreakerSnapshot, BreakerSnapshot, T), StoreError>
    where
        F: Fn(&BreakerSnapshot, u64) -> (BreakerSnapshot, T),
    {
        loop {
            let current_bytes = self.store.get(&self.key).await?;
            let current: BreakerSnapshot = match &current_bytes {
                Some(bytes) => decode_state(bytes)?,
                None => BreakerSnapshot::default(),
            };

            let (next, payload) = apply(&current, unix_millis());
            if next == current && current_bytes.is_some() {
                return Ok((current, next, payload));
            }

            let encoded = encode_state(&next)?;
            if self
                .store
                .compare_and_swap(&self.key, current_bytes.as_deref(), encoded, None)
                .await?
            {
                return Ok((current, next, payload));
            }
            // Lost the race to another worker; recompute against its write.
        }
    }

    fn emit_transition(&self, from: &BreakerSnapshot, to: &BreakerSnapshot) {
        if from.state == to.state {
            return;
        }
        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %self.name,
            from = ?from.state,
            to = ?to.state,
            "circuit state transition"
        );
        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                breaker_name: self.name.clone(),
                timestamp: Instant::now(),
                from_state: from.state,
                to_state: to.state,
            });
    }

    /// Asks the breaker for permission to call the dependency.
    ///
    /// Returns `CircuitOpen` without touching anything downstream when the
    /// circuit is open (or half-open with all probe slots taken).
    pub async fn try_acquire(&self) -> Result<(), ExecutionError> {
        let (from, to, decision) = self
            .transition(|snapshot, now| snapshot.on_acquire(now, &self.config))
            .await?;
        self.emit_transition(&from, &to);

        match decision {
            AcquireDecision::Permitted => {
                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallPermitted {
                        breaker_name: self.name.clone(),
                        timestamp: Instant::now(),
                        state: to.state,
                    });
                Ok(())
            }
            AcquireDecision::Rejected => {
                self.config
                    .event_listeners
                    .emit(&CircuitBreakerEvent::CallRejected {
                        breaker_name: self.name.clone(),
                        timestamp: Instant::now(),
                    });
                Err(ExecutionError::CircuitOpen {
                    name: self.name.clone(),
                })
            }
        }
    }

    /// Records a successful call.
    pub async fn record_success(&self) -> Result<(), StoreError> {
        let (from, to, ()) = self
            .transition(|snapshot, _| (snapshot.on_success(&self.config), ()))
            .await?;
        self.emit_transition(&from, &to);
        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::SuccessRecorded {
                breaker_name: self.name.clone(),
                timestamp: Instant::now(),
                state: to.state,
            });
        Ok(())
    }

    /// Records a failed call.
    pub async fn record_failure(&self) -> Result<(), StoreError> {
        let (from, to, ()) = self
            .transition(|snapshot, now| (snapshot.on_failure(now, &self.config), ()))
            .await?;
        self.emit_transition(&from, &to);
        self.config
            .event_listeners
            .emit(&CircuitBreakerEvent::FailureRecorded {
                breaker_name: self.name.clone(),
                timestamp: Instant::now(),
                state: to.state,
            });
        Ok(())
    }

    /// Forces the breaker open (operator control).
    pub async fn force_open(&self) -> Result<(), StoreError> {
        let (from, to, ()) = self
            .transition(|_, now| (BreakerSnapshot::forced_open(now), ()))
            .await?;
        self.emit_transition(&from, &to);
        Ok(())
    }

    /// Forces the breaker closed (operator control).
    pub async fn force_closed(&self) -> Result<(), StoreError> {
        let (from, to, ()) = self
            .transition(|_, _| (BreakerSnapshot::default(), ()))
            .await?;
        self.emit_transition(&from, &to);
        Ok(())
    }

    /// Resets the breaker to its initial closed state.
    pub async fn reset(&self) -> Result<(), StoreError> {
        self.force_closed().await
    }
}

/// Policy that gates the inner chain behind a circuit breaker.
///
/// Placed inside the retry policy by the executor, so every retry attempt
/// asks the breaker for permission again.
pub struct CircuitBreakerPolicy {
    breaker: CircuitBreaker,
}

impl CircuitBreakerPolicy {
    /// Wraps a breaker as a chain policy.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }
}

impl Policy for CircuitBreakerPolicy {
    fn execute(
        &self,
        invocation: TaskInvocation,
        next: Next,
    ) -> BoxFuture<'static, Result<TaskOutput, ExecutionError>> {
        let breaker = self.breaker.clone();
        Box::pin(async move {
            breaker.try_acquire().await?;

            let result = next.run(invocation).await;

            // Only dependency failures feed the state machine; admission
            // rejections from policies nested inside say nothing about the
            // dependency's health. Recording is best-effort: a completed
            // handler must never be re-run because bookkeeping failed.
            let recorded = match &result {
                Ok(_) => breaker.record_success().await,
                Err(error) if error.is_handler_failure() => breaker.record_failure().await,
                Err(ExecutionError::Store(_)) => breaker.record_failure().await,
                Err(_) => Ok(()),
            };
            if let Err(_store_error) = recorded {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    breaker = %breaker.name,
                    error = %_store_error,
                    "failed to record call result"
                );
            }

            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use taskguard_core::{HandlerFn, InMemoryStateStore, Outcome, TaskError};

    fn breaker(config: CircuitBreakerConfig) -> CircuitBreaker {
        CircuitBreaker::new("dep", config, Arc::new(InMemoryStateStore::new()))
    }

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = breaker(
            CircuitBreakerConfig::builder()
                .failure_threshold(3)
                .build(),
        );

        for _ in 0..3 {
            breaker.try_acquire().await.unwrap();
            breaker.record_failure().await.unwrap();
        }

        let snapshot = breaker.snapshot().await.unwrap();
        assert_eq!(snapshot.state, CircuitState::Open);
        assert!(matches!(
            breaker.try_acquire().await,
            Err(ExecutionError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn probe_is_admitted_after_the_reset_timeout() {
        let breaker = breaker(
            CircuitBreakerConfig::builder()
                .failure_threshold(1)
                .reset_timeout(Duration::from_millis(30))
                .build(),
        );

        breaker.record_failure().await.unwrap();
        assert!(breaker.try_acquire().await.is_err());

        tokio::time::sleep(Duration::from_millis(50)).await;

        breaker.try_acquire().await.unwrap();
        assert_eq!(
            breaker.snapshot().await.unwrap().state,
            CircuitState::HalfOpen
        );

        breaker.record_success().await.unwrap();
        assert_eq!(
            breaker.snapshot().await.unwrap().state,
            CircuitState::Closed
        );
    }

    #[tokio::test]
    async fn force_open_rejects_immediately() {
        let breaker = breaker(CircuitBreakerConfig::default());
        breaker.force_open().await.unwrap();
        assert!(breaker.try_acquire().await.is_err());

        breaker.force_closed().await.unwrap();
        assert!(breaker.try_acquire().await.is_ok());
    }

    #[tokio::test]
    async fn policy_skips_the_chain_when_open() {
        let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());
        let breaker = CircuitBreaker::new(
            "dep",
            CircuitBreakerConfig::builder().failure_threshold(1).build(),
            Arc::clone(&store),
        );
        breaker.force_open().await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let handler = Arc::new(HandlerFn::new(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Outcome::done()
            }
        }));

        let policies: Arc<[Arc<dyn Policy>]> =
            Arc::from(vec![
                Arc::new(CircuitBreakerPolicy::new(breaker)) as Arc<dyn Policy>
            ]);
        let result = Next::new(policies, handler)
            .run(TaskInvocation::new("demo", json!(null)))
            .await;

        assert!(matches!(result, Err(ExecutionError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn policy_records_handler_failures() {
        let store: Arc<dyn SharedStateStore> = Arc::new(InMemoryStateStore::new());
        let breaker = CircuitBreaker::new(
            "dep",
            CircuitBreakerConfig::builder().failure_threshold(2).build(),
            Arc::clone(&store),
        );

        let handler: Arc<dyn taskguard_core::TaskHandler> = Arc::new(HandlerFn::new(|_| async {
            Outcome::Transient(TaskError::transient("down"))
        }));
        let policies: Arc<[Arc<dyn Policy>]> = Arc::from(vec![Arc::new(CircuitBreakerPolicy::new(
            breaker.clone(),
        )) as Arc<dyn Policy>]);

        for _ in 0..2 {
            let handler: Arc<dyn taskguard_core::TaskHandler> = Arc::clone(&handler);
            let _ = Next::new(Arc::clone(&policies), handler)
                .run(TaskInvocation::new("demo", json!(null)))
                .await;
        }

        assert_eq!(breaker.snapshot().await.unwrap().state, CircuitState::Open);
    }
}
