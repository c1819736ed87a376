//! Dead-letter records and filters.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use taskguard_core::{TaskError, TaskId};

/// Durable record of one terminally failed invocation.
///
/// Created exactly once when a task exhausts its retries or fails
/// permanently. Only operator actions touch it afterwards: reprocessing
/// flips `reprocessed`, purging deletes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterRecord {
    /// Identifier of this record (not of the task).
    pub record_id: String,
    /// Id of the failed invocation.
    pub task_id: TaskId,
    /// Name of the task type.
    pub task_name: String,
    /// Arguments of the failed invocation, kept for reprocessing.
    pub args: serde_json::Value,
    /// The failure that exhausted the task.
    pub last_error: TaskError,
    /// When the terminal failure was captured.
    pub first_failed_at: SystemTime,
    /// Retries spent before the task was given up on.
    pub retry_count: u32,
    /// True once an operator resubmitted this record.
    pub reprocessed: bool,
    /// When the record was resubmitted.
    pub reprocessed_at: Option<SystemTime>,
}

/// Filter over dead-letter records for listing, bulk reprocessing, and purging.
#[derive(Debug, Clone, Default)]
pub struct DeadLetterFilter {
    /// Match only this task type.
    pub task_name: Option<String>,
    /// Match records captured at or after this instant.
    pub failed_after: Option<SystemTime>,
    /// Match records captured before this instant.
    pub failed_before: Option<SystemTime>,
    /// Also match records that were already reprocessed.
    pub include_reprocessed: bool,
}

impl DeadLetterFilter {
    /// A filter matching every un-reprocessed record.
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts the filter to one task type.
    pub fn task_name<S: Into<String>>(mut self, name: S) -> Self {
        self.task_name = Some(name.into());
        self
    }

    /// Restricts the filter to records captured at or after `instant`.
    pub fn failed_after(mut self, instant: SystemTime) -> Self {
        self.failed_after = Some(instant);
        self
    }

    /// Restricts the filter to records captured before `instant`.
    pub fn failed_before(mut self, instant: SystemTime) -> Self {
        self.failed_before = Some(instant);
        self
    }

    /// Includes records that were already reprocessed.
    pub fn include_reprocessed(mut self) -> Self {
        self.include_reprocessed = true;
        self
    }

    /// Whether `record` matches this filter.
    pub fn matches(&self, record: &DeadLetterRecord) -> bool {
        if let Some(name) = &self.task_name {
            if record.task_name != *name {
                return false;
            }
        }
        if let Some(after) = self.failed_after {
            if record.first_failed_at < after {
                return false;
            }
        }
        if let Some(before) = self.failed_before {
            if record.first_failed_at >= before {
                return false;
            }
        }
        if record.reprocessed && !self.include_reprocessed {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    fn record(task_name: &str, failed_at: SystemTime) -> DeadLetterRecord {
        DeadLetterRecord {
            record_id: "r1".into(),
            task_id: TaskId::new("t1"),
            task_name: task_name.into(),
            args: json!(null),
            last_error: TaskError::permanent("boom"),
            first_failed_at: failed_at,
            retry_count: 0,
            reprocessed: false,
            reprocessed_at: None,
        }
    }

    #[test]
    fn filter_matches_by_task_name() {
        let now = SystemTime::now();
        let filter = DeadLetterFilter::all().task_name("reports.generate");
        assert!(filter.matches(&record("reports.generate", now)));
        assert!(!filter.matches(&record("emails.send", now)));
    }

    #[test]
    fn filter_matches_by_time_range() {
        let now = SystemTime::now();
        let earlier = now - Duration::from_secs(120);
        let filter = DeadLetterFilter::all()
            .failed_after(now - Duration::from_secs(60))
            .failed_before(now + Duration::from_secs(60));

        assert!(filter.matches(&record("t", now)));
        assert!(!filter.matches(&record("t", earlier)));
    }

    #[test]
    fn reprocessed_records_are_hidden_by_default() {
        let mut reprocessed = record("t", SystemTime::now());
        reprocessed.reprocessed = true;

        assert!(!DeadLetterFilter::all().matches(&reprocessed));
        assert!(DeadLetterFilter::all()
            .include_reprocessed()
            .matches(&reprocessed));
    }
}
