//! The process-wide policy registry.

use std::sync::Arc;
use taskguard_circuitbreaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use taskguard_core::{InMemoryStateStore, SharedStateStore};
use taskguard_deadletter::{DeadLetterQueue, DeadLetterStore, InMemoryDeadLetterStore};
use taskguard_metrics::MetricsRecorder;

/// Shared policy state for one worker process.
///
/// Constructed once and passed by reference into every [`TaskExecutor`]
/// (and to whatever operator surface needs the dead-letter queue), instead
/// of hiding breakers and stores in module-level globals. The shared state
/// store decides how far the state reaches: an in-memory store confines it
/// to the process, a networked store shares it across the whole worker
/// fleet.
///
/// [`TaskExecutor`]: crate::TaskExecutor
pub struct PolicyRegistry {
    store: Arc<dyn SharedStateStore>,
    breakers: CircuitBreakerRegistry,
    dead_letters: Arc<DeadLetterQueue>,
    recorder: MetricsRecorder,
}

impl PolicyRegistry {
    /// Creates a registry over the given shared state and dead-letter stores.
    pub fn new(
        store: Arc<dyn SharedStateStore>,
        dead_letter_store: Arc<dyn DeadLetterStore>,
    ) -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(
                Arc::clone(&store),
                CircuitBreakerConfig::default(),
            ),
            dead_letters: Arc::new(DeadLetterQueue::new(dead_letter_store)),
            recorder: MetricsRecorder::new(),
            store,
        }
    }

    /// A registry confined to this process, for tests and simple deployments.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryDeadLetterStore::new()),
        )
    }

    /// Replaces the default configuration applied to unconfigured breakers.
    pub fn with_breaker_defaults(mut self, defaults: CircuitBreakerConfig) -> Self {
        self.breakers = CircuitBreakerRegistry::new(Arc::clone(&self.store), defaults);
        self
    }

    /// The shared state store.
    pub fn store(&self) -> Arc<dyn SharedStateStore> {
        Arc::clone(&self.store)
    }

    /// The circuit breaker registry.
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// The dead-letter queue (also the operator management surface).
    pub fn dead_letters(&self) -> Arc<DeadLetterQueue> {
        Arc::clone(&self.dead_letters)
    }

    /// The metrics recorder.
    pub fn recorder(&self) -> MetricsRecorder {
        self.recorder
    }
}
