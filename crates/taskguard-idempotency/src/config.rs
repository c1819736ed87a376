//! Idempotency guard configuration.

use crate::events::IdempotencyEvent;
use std::time::Duration;
use taskguard_core::events::{EventListeners, FnListener};

/// Configuration for the idempotency guard.
#[derive(Clone)]
pub struct IdempotencyConfig {
    pub(crate) ttl: Duration,
    pub(crate) cache_results: bool,
    pub(crate) event_listeners: EventListeners<IdempotencyEvent>,
    pub(crate) name: String,
}

impl IdempotencyConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> IdempotencyConfigBuilder {
        IdempotencyConfigBuilder::new()
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`IdempotencyConfig`].
pub struct IdempotencyConfigBuilder {
    ttl: Duration,
    cache_results: bool,
    event_listeners: EventListeners<IdempotencyEvent>,
    name: String,
}

impl Default for IdempotencyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl IdempotencyConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - ttl: 1 hour
    /// - cache_results: true
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            cache_results: true,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets how long an entry lives without being released.
    ///
    /// The ttl is the safety valve against crashed workers: once it passes,
    /// the key can be acquired again even though it was never released.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Controls whether completed entries cache the task's result so a
    /// duplicate trigger can return it instead of failing.
    ///
    /// Default: true.
    pub fn cache_results(mut self, cache: bool) -> Self {
        self.cache_results = cache;
        self
    }

    /// Sets the name for this guard instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a key is acquired.
    pub fn on_acquired<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::Acquired { key, .. } = event {
                f(key);
            }
        }));
        self
    }

    /// Registers a callback when a duplicate execution is blocked.
    pub fn on_duplicate<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::DuplicateBlocked {
                key, in_progress, ..
            } = event
            {
                f(key, *in_progress);
            }
        }));
        self
    }

    /// Registers a callback when a key is released.
    pub fn on_released<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, bool) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let IdempotencyEvent::Released { key, completed, .. } = event {
                f(key, *completed);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> IdempotencyConfig {
        IdempotencyConfig {
            ttl: self.ttl,
            cache_results: self.cache_results,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
