//! The shared state store behind cross-worker policy state.
//!
//! Circuit breaker snapshots, rate-limiter windows, and idempotency entries
//! must be visible to every worker, not just the process that created them.
//! They all go through this interface: atomic single-key operations, each one
//! round trip, no transactions. Any networked key-value store that can offer
//! `get` / `put` / conditional-put-with-expiry / compare-and-swap satisfies
//! it; the bundled [`InMemoryStateStore`] serves tests and single-process
//! deployments.

use crate::error::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Atomic key-value operations over a store shared by all workers.
#[async_trait]
pub trait SharedStateStore: Send + Sync + 'static {
    /// Reads the live value under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Unconditionally writes `value` under `key`.
    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError>;

    /// Writes `value` only if `key` holds no live value.
    ///
    /// Returns true if the write happened.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Replaces the value under `key` only if it currently equals `expected`
    /// (`None` meaning the key holds no live value).
    ///
    /// Returns true if the swap happened.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError>;

    /// Removes the value under `key`, if any.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Encodes a typed state value for storage.
pub fn encode_state<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decodes a typed state value read from storage.
pub fn decode_state<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

struct StoredEntry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn new(value: Vec<u8>, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_live(&self) -> bool {
        self.expires_at.map_or(true, |deadline| Instant::now() < deadline)
    }
}

/// Process-local [`SharedStateStore`] with lazy TTL expiry.
#[derive(Default)]
pub struct InMemoryStateStore {
    entries: Mutex<HashMap<String, StoredEntry>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SharedStateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock().expect("state store lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("state store lock poisoned");
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(())
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().expect("state store lock poisoned");
        if entries.get(key).is_some_and(StoredEntry::is_live) {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<bool, StoreError> {
        let mut entries = self.entries.lock().expect("state store lock poisoned");
        let current = entries
            .get(key)
            .filter(|entry| entry.is_live())
            .map(|entry| entry.value.as_slice());
        if current != expected {
            return Ok(false);
        }
        entries.insert(key.to_string(), StoredEntry::new(value, ttl));
        Ok(true)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("state store lock poisoned");
        entries.remove(key);
        Ok(())
    }
}
