//! Submission model
//!
//! A submission moves `Pending -> Running -> <terminal>` exactly once. Test
//! results are appended only while it is `Running` and are frozen afterwards.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{statuses, test_statuses};

use super::Language;

/// Submission record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub language: Language,
    #[serde(skip_serializing)]
    pub source_code: String,
    pub status: SubmissionStatus,
    pub test_results: Vec<TestResult>,
    pub error_detail: Option<String>,
    pub metrics: ExecutionMetrics,
    pub submitted_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub judged_at: Option<DateTime<Utc>>,
    pub stats_applied: bool,
}

/// Fields supplied by the intake path
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub user_id: Uuid,
    pub problem_id: Uuid,
    pub language: Language,
    pub source_code: String,
}

impl Submission {
    /// Build a fresh `Pending` record
    pub fn pending(new: NewSubmission) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            problem_id: new.problem_id,
            language: new.language,
            source_code: new.source_code,
            status: SubmissionStatus::Pending,
            test_results: Vec::new(),
            error_detail: None,
            metrics: ExecutionMetrics::default(),
            submitted_at: Utc::now(),
            claimed_at: None,
            judged_at: None,
            stats_applied: false,
        }
    }

    /// Check if judging has finished
    pub fn is_complete(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Submission status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Running,
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RuntimeError,
    CompilationError,
    SystemError,
}

impl SubmissionStatus {
    /// Get status as stored string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => statuses::PENDING,
            Self::Running => statuses::RUNNING,
            Self::Accepted => statuses::ACCEPTED,
            Self::WrongAnswer => statuses::WRONG_ANSWER,
            Self::TimeLimitExceeded => statuses::TIME_LIMIT_EXCEEDED,
            Self::RuntimeError => statuses::RUNTIME_ERROR,
            Self::CompilationError => statuses::COMPILATION_ERROR,
            Self::SystemError => statuses::SYSTEM_ERROR,
        }
    }

    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Accepted => "Accepted",
            Self::WrongAnswer => "Wrong Answer",
            Self::TimeLimitExceeded => "Time Limit Exceeded",
            Self::RuntimeError => "Runtime Error",
            Self::CompilationError => "Compilation Error",
            Self::SystemError => "System Error",
        }
    }

    /// Check if this is a final status (judging complete)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Check if this status means the solution was accepted
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    /// Allowed transitions: `Pending -> Running -> terminal`, nothing else
    pub fn can_transition_to(&self, next: SubmissionStatus) -> bool {
        match self {
            Self::Pending => next == Self::Running,
            Self::Running => next.is_terminal(),
            _ => false,
        }
    }
}

/// Parses the stored form produced by `as_str`
impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            statuses::PENDING => Ok(Self::Pending),
            statuses::RUNNING => Ok(Self::Running),
            statuses::ACCEPTED => Ok(Self::Accepted),
            statuses::WRONG_ANSWER => Ok(Self::WrongAnswer),
            statuses::TIME_LIMIT_EXCEEDED => Ok(Self::TimeLimitExceeded),
            statuses::RUNTIME_ERROR => Ok(Self::RuntimeError),
            statuses::COMPILATION_ERROR => Ok(Self::CompilationError),
            statuses::SYSTEM_ERROR => Ok(Self::SystemError),
            _ => Err(s.to_string()),
        }
    }
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of a single test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestResultStatus {
    Passed,
    Failed,
    Timeout,
    Error,
}

impl TestResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passed => test_statuses::PASSED,
            Self::Failed => test_statuses::FAILED,
            Self::Timeout => test_statuses::TIMEOUT,
            Self::Error => test_statuses::ERROR,
        }
    }

}

impl FromStr for TestResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            test_statuses::PASSED => Ok(Self::Passed),
            test_statuses::FAILED => Ok(Self::Failed),
            test_statuses::TIMEOUT => Ok(Self::Timeout),
            test_statuses::ERROR => Ok(Self::Error),
            _ => Err(s.to_string()),
        }
    }
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Position of the case in the problem's test list (0-based)
    pub index: u32,
    pub status: TestResultStatus,
    pub actual_output: String,
    pub time_ms: u64,
    /// Peak memory in KB; `None` when the sandbox cannot measure it
    pub memory_kb: Option<u64>,
    pub error_message: Option<String>,
}

impl TestResult {
    /// Create a passed result
    pub fn passed(index: u32, actual_output: String, time_ms: u64, memory_kb: Option<u64>) -> Self {
        Self {
            index,
            status: TestResultStatus::Passed,
            actual_output,
            time_ms,
            memory_kb,
            error_message: None,
        }
    }

    /// Create a wrong answer result
    pub fn failed(index: u32, actual_output: String, time_ms: u64, memory_kb: Option<u64>) -> Self {
        Self {
            index,
            status: TestResultStatus::Failed,
            actual_output,
            time_ms,
            memory_kb,
            error_message: None,
        }
    }

    /// Create a timeout result
    pub fn timeout(index: u32, time_limit_ms: u64) -> Self {
        Self {
            index,
            status: TestResultStatus::Timeout,
            actual_output: String::new(),
            time_ms: time_limit_ms,
            memory_kb: None,
            error_message: Some(format!("Time limit of {}ms exceeded", time_limit_ms)),
        }
    }

    /// Create a runtime error result
    pub fn error(
        index: u32,
        actual_output: String,
        time_ms: u64,
        memory_kb: Option<u64>,
        message: String,
    ) -> Self {
        Self {
            index,
            status: TestResultStatus::Error,
            actual_output,
            time_ms,
            memory_kb,
            error_message: Some(message),
        }
    }

    pub fn is_passed(&self) -> bool {
        self.status == TestResultStatus::Passed
    }
}

/// Advisory resource figures for a judged submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetrics {
    pub max_time_ms: Option<u64>,
    pub max_memory_kb: Option<u64>,
}

impl ExecutionMetrics {
    /// Fold per-test figures into maxima
    pub fn from_results(results: &[TestResult]) -> Self {
        Self {
            max_time_ms: results.iter().map(|r| r.time_ms).max(),
            max_memory_kb: results.iter().filter_map(|r| r.memory_kb).max(),
        }
    }
}

/// Final state written when a submission leaves `Running`
#[derive(Debug, Clone, PartialEq)]
pub struct Judgement {
    pub status: SubmissionStatus,
    pub error_detail: Option<String>,
    pub metrics: ExecutionMetrics,
}

impl Judgement {
    /// Catch-all outcome for internal failures
    pub fn system_error(message: &str) -> Self {
        Self {
            status: SubmissionStatus::SystemError,
            error_detail: Some(message.to_string()),
            metrics: ExecutionMetrics::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SubmissionStatus; 8] = [
        SubmissionStatus::Pending,
        SubmissionStatus::Running,
        SubmissionStatus::Accepted,
        SubmissionStatus::WrongAnswer,
        SubmissionStatus::TimeLimitExceeded,
        SubmissionStatus::RuntimeError,
        SubmissionStatus::CompilationError,
        SubmissionStatus::SystemError,
    ];

    #[test]
    fn test_transitions_are_one_directional() {
        for from in ALL {
            for to in ALL {
                let allowed = from.can_transition_to(to);
                let expected = match from {
                    SubmissionStatus::Pending => to == SubmissionStatus::Running,
                    SubmissionStatus::Running => to.is_terminal(),
                    _ => false,
                };
                assert_eq!(allowed, expected, "{from:?} -> {to:?}");
            }
        }
        assert!(!SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Accepted));
        assert!(!SubmissionStatus::Running.can_transition_to(SubmissionStatus::Pending));
    }

    #[test]
    fn test_status_string_roundtrip() {
        for status in ALL {
            assert_eq!(status.as_str().parse::<SubmissionStatus>(), Ok(status));
        }
        assert_eq!(SubmissionStatus::WrongAnswer.label(), "Wrong Answer");
        assert_eq!("judging".parse::<SubmissionStatus>(), Err("judging".to_string()));
        // Labels are for display only
        assert!("Wrong Answer".parse::<SubmissionStatus>().is_err());
    }

    #[test]
    fn test_test_status_parses_stored_form() {
        for status in [
            TestResultStatus::Passed,
            TestResultStatus::Failed,
            TestResultStatus::Timeout,
            TestResultStatus::Error,
        ] {
            assert_eq!(status.as_str().parse::<TestResultStatus>(), Ok(status));
        }
        assert!("skipped".parse::<TestResultStatus>().is_err());
    }

    #[test]
    fn test_metrics_ignore_missing_memory() {
        let results = vec![
            TestResult::passed(0, "1".into(), 12, None),
            TestResult::passed(1, "2".into(), 30, Some(2048)),
            TestResult::timeout(2, 2000),
        ];
        let metrics = ExecutionMetrics::from_results(&results);
        assert_eq!(metrics.max_time_ms, Some(2000));
        assert_eq!(metrics.max_memory_kb, Some(2048));

        assert_eq!(ExecutionMetrics::from_results(&[]), ExecutionMetrics::default());
    }
}
