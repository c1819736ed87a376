//! Retry configuration.

use crate::backoff::{ExponentialBackoff, FixedInterval, IntervalFunction, SharedInterval};
use crate::events::RetryEvent;
use std::sync::Arc;
use std::time::Duration;
use taskguard_core::events::{EventListeners, FnListener};

/// Configuration for the retry policy.
pub struct RetryConfig {
    pub(crate) max_retries: u32,
    pub(crate) interval: SharedInterval,
    pub(crate) retry_on_timeout: bool,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl RetryConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
    jitter_fraction: f64,
    interval: Option<SharedInterval>,
    retry_on_timeout: bool,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl Default for RetryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryConfigBuilder {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_retries: 3
    /// - base_delay: 1 second, max_delay: 1 hour
    /// - backoff_multiplier: 2.0, jitter_fraction: 0.1
    /// - retry_on_timeout: true
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3600),
            backoff_multiplier: 2.0,
            jitter_fraction: 0.1,
            interval: None,
            retry_on_timeout: true,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of retries after the initial attempt.
    ///
    /// `max_retries = 3` allows up to 4 handler invocations in total.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the delay before the first retry.
    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the upper bound no backoff delay will exceed.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the growth factor between consecutive delays.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Sets the jitter fraction applied to each delay.
    pub fn jitter_fraction(mut self, fraction: f64) -> Self {
        self.jitter_fraction = fraction;
        self
    }

    /// Uses a fixed backoff interval instead of the exponential defaults.
    pub fn fixed_backoff(mut self, interval: Duration) -> Self {
        self.interval = Some(Arc::new(FixedInterval::new(interval)));
        self
    }

    /// Uses a custom interval function instead of the exponential defaults.
    pub fn backoff<I>(mut self, interval: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval = Some(Arc::new(interval));
        self
    }

    /// Controls whether timeout failures are retried.
    ///
    /// Default: true.
    pub fn retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Sets the name for this retry instance (used in events).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked before each backoff sleep.
    ///
    /// The callback receives the retry about to be made (1-indexed) and the
    /// delay before it.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(u32, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback invoked when the invocation succeeds.
    ///
    /// The callback receives the total number of attempts (1 = first try).
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when every permitted attempt failed.
    pub fn on_exhausted<F>(mut self, f: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Exhausted { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback invoked when an error is surfaced without retrying.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> RetryConfig {
        let interval = self.interval.unwrap_or_else(|| {
            Arc::new(
                ExponentialBackoff::new(self.base_delay)
                    .multiplier(self.backoff_multiplier)
                    .max_delay(self.max_delay)
                    .jitter_fraction(self.jitter_fraction),
            )
        });

        RetryConfig {
            max_retries: self.max_retries,
            interval,
            retry_on_timeout: self.retry_on_timeout,
            event_listeners: self.event_listeners,
            name: self.name,
        }
    }
}
