//! Dead-letter log for submissions that ended in `System Error`

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::constants::DEAD_LETTER_CAPACITY;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeadLetter {
    pub submission_id: Uuid,
    pub error: String,
    pub recorded_at: DateTime<Utc>,
}

/// Bounded, newest-last log; the oldest entry is dropped when full
#[derive(Debug)]
pub struct DeadLetterLog {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl Default for DeadLetterLog {
    fn default() -> Self {
        Self::with_capacity(DEAD_LETTER_CAPACITY)
    }
}

impl DeadLetterLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(64))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, submission_id: Uuid, error: impl Into<String>) {
        let letter = DeadLetter {
            submission_id,
            error: error.into(),
            recorded_at: Utc::now(),
        };
        tracing::error!(
            submission_id = %letter.submission_id,
            error = %letter.error,
            "Submission dead-lettered"
        );

        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    /// Snapshot, oldest first
    pub fn list(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
