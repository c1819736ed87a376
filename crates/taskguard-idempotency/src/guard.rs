//! The execute-once guard.

use crate::config::IdempotencyConfig;
use crate::events::IdempotencyEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use taskguard_core::store::{decode_state, encode_state};
use taskguard_core::{SharedStateStore, StoreError, TaskOutput};

/// Lifecycle of an idempotency entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    /// A worker holds the key and is executing.
    InProgress,
    /// The execution finished; the entry suppresses duplicates until its ttl.
    Completed,
}

/// Serialized entry stored under `idem:{key}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdempotencyEntry {
    status: EntryStatus,
    acquired_at: u64,
    /// Cached task result, present on completed entries when caching is on.
    result: Option<TaskOutput>,
}

/// Result of an acquire attempt.
#[derive(Debug, Clone)]
pub enum Acquire {
    /// The key is now held by this worker; it must be released.
    Acquired,
    /// Another worker holds the key.
    AlreadyInProgress,
    /// The key completed within its ttl window.
    AlreadyCompleted {
        /// The cached result, when caching was enabled.
        result: Option<TaskOutput>,
    },
}

/// How a held key is released.
#[derive(Debug, Clone)]
pub enum Release {
    /// Mark the entry completed, optionally caching the result.
    Completed(Option<TaskOutput>),
    /// Remove the entry so the key can be acquired again (failed execution).
    Abandoned,
}

/// Derives a stable idempotency key from the task signature.
///
/// The same name and arguments always produce the same key, on every worker,
/// so duplicate triggers collide no matter which process handles them.
pub fn execution_key(task_name: &str, args: &serde_json::Value) -> String {
    let payload = format!("{task_name}\n{args}");
    uuid::Uuid::new_v5(&uuid::Uuid::NAMESPACE_OID, payload.as_bytes()).to_string()
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Cross-worker execute-once enforcement over the shared store.
///
/// `acquire` is a conditional-set-if-absent with expiry: exactly one of any
/// number of racing workers wins the key. If the winner crashes before
/// releasing, the entry expires after the configured ttl and a later acquire
/// succeeds: at-least-once execution traded for liveness.
#[derive(Clone)]
pub struct IdempotencyGuard {
    config: Arc<IdempotencyConfig>,
    store: Arc<dyn SharedStateStore>,
}

impl IdempotencyGuard {
    /// Creates a guard over the given store.
    pub fn new(config: IdempotencyConfig, store: Arc<dyn SharedStateStore>) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Whether completed entries cache the task result.
    pub fn caches_results(&self) -> bool {
        self.config.cache_results
    }

    fn storage_key(key: &str) -> String {
        format!("idem:{key}")
    }

    /// Tries to take ownership of `key` for one execution.
    pub async fn acquire(&self, key: &str) -> Result<Acquire, StoreError> {
        let storage_key = Self::storage_key(key);
        let entry = IdempotencyEntry {
            status: EntryStatus::InProgress,
            acquired_at: unix_millis(),
            result: None,
        };
        let encoded = encode_state(&entry)?;

        loop {
            if self
                .store
                .put_if_absent(&storage_key, encoded.clone(), Some(self.config.ttl))
                .await?
            {
                self.config.event_listeners.emit(&IdempotencyEvent::Acquired {
                    policy_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                });
                return Ok(Acquire::Acquired);
            }

            // The key is held; find out by whom.
            let Some(bytes) = self.store.get(&storage_key).await? else {
                // Expired between the two reads; race again.
                continue;
            };
            let existing: IdempotencyEntry = decode_state(&bytes)?;
            let (acquire, in_progress) = match existing.status {
                EntryStatus::InProgress => (Acquire::AlreadyInProgress, true),
                EntryStatus::Completed => (
                    Acquire::AlreadyCompleted {
                        result: existing.result,
                    },
                    false,
                ),
            };
            self.config
                .event_listeners
                .emit(&IdempotencyEvent::DuplicateBlocked {
                    policy_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    key: key.to_string(),
                    in_progress,
                });
            #[cfg(feature = "tracing")]
            tracing::debug!(key, in_progress, "duplicate execution blocked");
            return Ok(acquire);
        }
    }

    /// Releases a key this worker holds.
    pub async fn release(&self, key: &str, release: Release) -> Result<(), StoreError> {
        let storage_key = Self::storage_key(key);
        let completed = match release {
            Release::Completed(result) => {
                let entry = IdempotencyEntry {
                    status: EntryStatus::Completed,
                    acquired_at: unix_millis(),
                    result: if self.config.cache_results {
                        result
                    } else {
                        None
                    },
                };
                self.store
                    .put(&storage_key, encode_state(&entry)?, Some(self.config.ttl))
                    .await?;
                true
            }
            Release::Abandoned => {
                self.store.remove(&storage_key).await?;
                false
            }
        };
        self.config.event_listeners.emit(&IdempotencyEvent::Released {
            policy_name: self.config.name.clone(),
            timestamp: Instant::now(),
            key: key.to_string(),
            completed,
        });
        Ok(())
    }
}
