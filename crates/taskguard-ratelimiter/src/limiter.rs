//! Sliding-window admission over the shared store.

use crate::config::RateLimiterConfig;
use crate::events::RateLimiterEvent;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use taskguard_core::store::{decode_state, encode_state};
use taskguard_core::{ExecutionError, SharedStateStore, StoreError};

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Serialized admission window for one key, stored under `rl:{key}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct WindowRecord {
    /// Unix-millis timestamps of admitted calls, oldest first.
    admitted: VecDeque<u64>,
}

impl WindowRecord {
    fn prune(&mut self, now_millis: u64, period: Duration) {
        let cutoff = now_millis.saturating_sub(period.as_millis() as u64);
        while let Some(&oldest) = self.admitted.front() {
            if oldest <= cutoff {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }

    fn retry_after(&self, now_millis: u64, period: Duration) -> Option<Duration> {
        self.admitted.front().map(|&oldest| {
            let free_at = oldest.saturating_add(period.as_millis() as u64);
            Duration::from_millis(free_at.saturating_sub(now_millis))
        })
    }
}

/// Per-key admission control: at most `calls` admitted calls per rolling
/// `period` per key, enforced through the shared store so every worker sees
/// the same window.
#[derive(Clone)]
pub struct RateLimiter {
    config: Arc<RateLimiterConfig>,
    store: Arc<dyn SharedStateStore>,
}

impl RateLimiter {
    /// Creates a limiter over the given store.
    pub fn new(config: RateLimiterConfig, store: Arc<dyn SharedStateStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    fn storage_key(key: &str) -> String {
        format!("rl:{key}")
    }

    /// Tries to admit one call under `key`.
    ///
    /// Rejected calls receive [`ExecutionError::RateLimited`]; this layer
    /// never queues or retries them itself.
    pub async fn allow(&self, key: &str) -> Result<(), ExecutionError> {
        let storage_key = Self::storage_key(key);

        loop {
            let current_bytes = self.store.get(&storage_key).await?;
            let mut window: WindowRecord = match &current_bytes {
                Some(bytes) => decode_state(bytes)?,
                None => WindowRecord::default(),
            };

            let now = unix_millis();
            window.prune(now, self.config.period);

            if window.admitted.len() >= self.config.calls {
                let retry_after = window.retry_after(now, self.config.period);
                self.config
                    .event_listeners
                    .emit(&RateLimiterEvent::Rejected {
                        policy_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        key: key.to_string(),
                        retry_after,
                    });
                #[cfg(feature = "tracing")]
                tracing::debug!(key, ?retry_after, "rate limit exceeded");
                return Err(ExecutionError::RateLimited {
                    key: key.to_string(),
                    retry_after,
                });
            }

            window.admitted.push_back(now);
            let encoded = encode_state(&window)?;
            // Idle keys expire with the window instead of lingering forever.
            if self
                .store
                .compare_and_swap(
                    &storage_key,
                    current_bytes.as_deref(),
                    encoded,
                    Some(self.config.period),
                )
                .await?
            {
                self.config
                    .event_listeners
                    .emit(&RateLimiterEvent::Admitted {
                        policy_name: self.config.name.clone(),
                        timestamp: Instant::now(),
                        key: key.to_string(),
                        in_window: window.admitted.len(),
                    });
                return Ok(());
            }
            // Lost the race to another worker; re-read its window.
        }
    }

    /// Admitted calls currently inside `key`'s rolling window.
    pub async fn admitted_in_window(&self, key: &str) -> Result<usize, StoreError> {
        let mut window: WindowRecord = match self.store.get(&Self::storage_key(key)).await? {
            Some(bytes) => decode_state(&bytes)?,
            None => WindowRecord::default(),
        };
        window.prune(unix_millis(), self.config.period);
        Ok(window.admitted.len())
    }
}
