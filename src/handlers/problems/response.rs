//! Problem response DTOs

use serde::Serialize;
use uuid::Uuid;

use crate::models::{ProblemStats, TestCase, TestResult, TestResultStatus};

/// Outcome of one sample case in a preview run
#[derive(Debug, Serialize)]
pub struct PreviewCaseResult {
    pub index: u32,
    pub status: TestResultStatus,
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub time_ms: u64,
    pub memory_kb: Option<u64>,
    pub error_message: Option<String>,
}

impl PreviewCaseResult {
    pub fn new(case: &TestCase, result: TestResult) -> Self {
        Self {
            index: result.index,
            status: result.status,
            input: case.input.clone(),
            expected_output: case.expected_output.clone(),
            actual_output: result.actual_output,
            time_ms: result.time_ms,
            memory_kb: result.memory_kb,
            error_message: result.error_message,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    /// "All Passed", "Some Failed" or "Compilation Error"
    pub status: String,
}

/// Preview run report; nothing here is persisted
#[derive(Debug, Serialize)]
pub struct RunCodeResponse {
    pub results: Vec<PreviewCaseResult>,
    pub compile_error: Option<String>,
    pub summary: RunSummary,
}

#[derive(Debug, Serialize)]
pub struct ProblemStatsResponse {
    pub problem_id: Uuid,
    pub total_submissions: u64,
    pub accepted_submissions: u64,
    pub solved_by: u64,
    pub acceptance_rate: f64,
}

impl From<ProblemStats> for ProblemStatsResponse {
    fn from(stats: ProblemStats) -> Self {
        Self {
            acceptance_rate: stats.acceptance_rate(),
            problem_id: stats.problem_id,
            total_submissions: stats.total_submissions,
            accepted_submissions: stats.accepted_submissions,
            solved_by: stats.solved_by,
        }
    }
}
