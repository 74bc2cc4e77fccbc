//! Problem model
//!
//! Problems are authored elsewhere; the judge only reads them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DEFAULT_MEMORY_LIMIT_MB, DEFAULT_TIME_LIMIT_MS, MIN_JUDGING_TEST_CASES};

/// Problem with its ordered test cases
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Problem {
    pub id: Uuid,
    pub title: String,
    #[serde(default = "default_time_limit_ms")]
    pub time_limit_ms: u64,
    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,
    pub test_cases: Vec<TestCase>,
}

/// One (input, expected output) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases are judged but never shown in previews
    #[serde(default)]
    pub hidden: bool,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>, hidden: bool) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            hidden,
        }
    }
}

impl Problem {
    /// First `limit` visible cases, in declared order
    pub fn preview_cases(&self, limit: usize) -> Vec<TestCase> {
        self.test_cases
            .iter()
            .filter(|case| !case.hidden)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Check the authoring invariants full judging relies on
    pub fn validate_for_judging(&self) -> Result<(), String> {
        if self.test_cases.len() < MIN_JUDGING_TEST_CASES {
            return Err(format!(
                "Problem {} has {} test cases, at least {} are required",
                self.id,
                self.test_cases.len(),
                MIN_JUDGING_TEST_CASES
            ));
        }
        if self.test_cases.iter().all(|case| case.hidden) {
            return Err(format!("Problem {} has no visible test case", self.id));
        }
        Ok(())
    }
}

fn default_time_limit_ms() -> u64 {
    DEFAULT_TIME_LIMIT_MS
}

fn default_memory_limit_mb() -> u64 {
    DEFAULT_MEMORY_LIMIT_MB
}
