//! Dead-letter storage.

use crate::record::{DeadLetterFilter, DeadLetterRecord};
use crate::DeadLetterError;
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::SystemTime;
use taskguard_core::{TaskError, TaskInvocation};

/// Durable storage for dead-letter records.
///
/// The store is deliberately dumb: it appends what it is told to append.
/// Capturing exactly once per terminal failure is the executor's job.
#[async_trait]
pub trait DeadLetterStore: Send + Sync + 'static {
    /// Persists a record for a terminally failed invocation and returns its
    /// record id.
    async fn capture(
        &self,
        invocation: &TaskInvocation,
        error: &TaskError,
    ) -> Result<String, DeadLetterError>;

    /// Lists records matching `filter`, oldest first.
    async fn list(
        &self,
        filter: &DeadLetterFilter,
    ) -> Result<Vec<DeadLetterRecord>, DeadLetterError>;

    /// Reads one record by id.
    async fn get(&self, record_id: &str) -> Result<Option<DeadLetterRecord>, DeadLetterError>;

    /// Flags a record as reprocessed. The record is otherwise untouched.
    async fn mark_reprocessed(&self, record_id: &str) -> Result<(), DeadLetterError>;

    /// Deletes a record. Returns false if it did not exist.
    async fn purge(&self, record_id: &str) -> Result<bool, DeadLetterError>;
}

/// Process-local [`DeadLetterStore`] for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryDeadLetterStore {
    records: Mutex<Vec<DeadLetterRecord>>,
}

impl InMemoryDeadLetterStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().expect("dead letter lock poisoned").len()
    }

    /// True if no records are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DeadLetterStore for InMemoryDeadLetterStore {
    async fn capture(
        &self,
        invocation: &TaskInvocation,
        error: &TaskError,
    ) -> Result<String, DeadLetterError> {
        let record = DeadLetterRecord {
            record_id: uuid::Uuid::new_v4().to_string(),
            task_id: invocation.task_id.clone(),
            task_name: invocation.task_name.clone(),
            args: invocation.args.clone(),
            last_error: error.clone(),
            first_failed_at: SystemTime::now(),
            retry_count: invocation.attempt_count(),
            reprocessed: false,
            reprocessed_at: None,
        };
        let record_id = record.record_id.clone();
        self.records
            .lock()
            .expect("dead letter lock poisoned")
            .push(record);
        Ok(record_id)
    }

    async fn list(
        &self,
        filter: &DeadLetterFilter,
    ) -> Result<Vec<DeadLetterRecord>, DeadLetterError> {
        let records = self.records.lock().expect("dead letter lock poisoned");
        let mut matching: Vec<DeadLetterRecord> = records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        matching.sort_by_key(|record| record.first_failed_at);
        Ok(matching)
    }

    async fn get(&self, record_id: &str) -> Result<Option<DeadLetterRecord>, DeadLetterError> {
        let records = self.records.lock().expect("dead letter lock poisoned");
        Ok(records
            .iter()
            .find(|record| record.record_id == record_id)
            .cloned())
    }

    async fn mark_reprocessed(&self, record_id: &str) -> Result<(), DeadLetterError> {
        let mut records = self.records.lock().expect("dead letter lock poisoned");
        let record = records
            .iter_mut()
            .find(|record| record.record_id == record_id)
            .ok_or_else(|| DeadLetterError::NotFound {
                record_id: record_id.to_string(),
            })?;
        record.reprocessed = true;
        record.reprocessed_at = Some(SystemTime::now());
        Ok(())
    }

    async fn purge(&self, record_id: &str) -> Result<bool, DeadLetterError> {
        let mut records = self.records.lock().expect("dead letter lock poisoned");
        let before = records.len();
        records.retain(|record| record.record_id != record_id);
        Ok(records.len() < before)
    }
}
