//! Rate limiter configuration.

use crate::events::RateLimiterEvent;
use std::time::Duration;
use taskguard_core::events::{EventListeners, FnListener};

/// Configuration for the rate limiter.
#[derive(Clone)]
pub struct RateLimiterConfig {
    pub(crate) calls: usize,
    pub(crate) period: Duration,
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
    pub(crate) name: String,
}

impl RateLimiterConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RateLimiterConfigBuilder {
        RateLimiterConfigBuilder::new()
    }
}

/// Builder for [`RateLimiterConfig`].
pub struct RateLimiterConfigBuilder {
    calls: usize,
    period: Duration,
    event_listeners: EventListeners<RateLimiterEvent>,
    name: String,
}

impl Default for RateLimiterConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - calls: 100
    /// - period: 60 seconds
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            calls: 100,
            period: Duration::from_secs(60),
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of admitted calls per rolling period per key.
    pub fn calls(mut self, calls: usize) -> Self {
        self.calls = calls.max(1);
        self
    }

    /// Sets the length of the rolling window.
    pub fn period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Sets the name for this limiter instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a call is admitted.
    ///
    /// The callback receives the key and the number of admitted calls now in
    /// its window.
    pub fn on_admitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Admitted { key, in_window, .. } = event {
                f(key, *in_window);
            }
        }));
        self
    }

    /// Registers a callback when a call is rejected.
    ///
    /// The callback receives the key and the time until the window has room
    /// again.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Option<Duration>) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RateLimiterEvent::Rejected {
                key, retry_after, ..
            } = event
            {
                f(key, *retry_after);
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RateLimiterConfig {
        RateLimiterConfig {
            calls: self.calls,
            period: self.period,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
