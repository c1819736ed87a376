//! The breaker registry.
//!
//! One registry per process, constructed alongside the executor and passed
//! by reference wherever breakers are needed. Dependency names map to
//! breaker handles lazily; handles sharing a name also share their stored
//! snapshot, even across processes pointing at the same store.

use crate::config::CircuitBreakerConfig;
use crate::CircuitBreaker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use taskguard_core::SharedStateStore;

/// Named, thread-safe circuit breakers over one shared store.
pub struct CircuitBreakerRegistry {
    store: Arc<dyn SharedStateStore>,
    defaults: Arc<CircuitBreakerConfig>,
    overrides: Mutex<HashMap<String, Arc<CircuitBreakerConfig>>>,
}

impl CircuitBreakerRegistry {
    /// Creates a registry with defaults applied to unconfigured names.
    pub fn new(store: Arc<dyn SharedStateStore>, defaults: CircuitBreakerConfig) -> Self {
        Self {
            store,
            defaults: Arc::new(defaults),
            overrides: Mutex::new(HashMap::new()),
        }
    }

    /// Overrides the configuration for one dependency name.
    pub fn set_config(&self, name: impl Into<String>, config: CircuitBreakerConfig) {
        self.overrides
            .lock()
            .expect("registry lock poisoned")
            .insert(name.into(), Arc::new(config));
    }

    /// Returns the breaker for `name`, creating it with the name's
    /// configuration (or the registry defaults) on first use.
    pub fn breaker(&self, name: &str) -> CircuitBreaker {
        let config = self
            .overrides
            .lock()
            .expect("registry lock poisoned")
            .get(name)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.defaults));
        CircuitBreaker::with_shared_config(name, config, Arc::clone(&self.store))
    }

    /// Names with explicit configuration overrides.
    pub fn configured_names(&self) -> Vec<String> {
        self.overrides
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CircuitState;
    use taskguard_core::InMemoryStateStore;

    #[tokio::test]
    async fn handles_with_the_same_name_share_state() {
        let registry = CircuitBreakerRegistry::new(
            Arc::new(InMemoryStateStore::new()),
            CircuitBreakerConfig::builder().failure_threshold(1).build(),
        );

        registry.breaker("dep").record_failure().await.unwrap();

        let other_handle = registry.breaker("dep");
        assert_eq!(
            other_handle.snapshot().await.unwrap().state,
            CircuitState::Open
        );
    }

    #[tokio::test]
    async fn overrides_beat_defaults() {
        let registry = CircuitBreakerRegistry::new(
            Arc::new(InMemoryStateStore::new()),
            CircuitBreakerConfig::builder().failure_threshold(5).build(),
        );
        registry.set_config(
            "fragile",
            CircuitBreakerConfig::builder().failure_threshold(1).build(),
        );

        registry.breaker("fragile").record_failure().await.unwrap();
        assert_eq!(
            registry.breaker("fragile").snapshot().await.unwrap().state,
            CircuitState::Open
        );

        registry.breaker("robust").record_failure().await.unwrap();
        assert_eq!(
            registry.breaker("robust").snapshot().await.unwrap().state,
            CircuitState::Closed
        );
    }
}
