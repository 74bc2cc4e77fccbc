//! Submission response DTOs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    judge::TestSummary,
    models::{ExecutionMetrics, Submission, SubmissionStatus},
};

/// Returned by intake as soon as the submission is queued
#[derive(Debug, Serialize)]
pub struct CreateSubmissionResponse {
    pub id: Uuid,
    pub status: SubmissionStatus,
    pub message: String,
}

/// Polling view of a submission
#[derive(Debug, Serialize)]
pub struct SubmissionStatusResponse {
    pub id: Uuid,
    pub status: SubmissionStatus,
    /// Human-readable status, e.g. "Wrong Answer"
    pub label: &'static str,
    pub is_complete: bool,
    pub test_summary: TestSummary,
    pub error_detail: Option<String>,
    pub metrics: ExecutionMetrics,
    pub submitted_at: DateTime<Utc>,
    pub judged_at: Option<DateTime<Utc>>,
}

impl From<&Submission> for SubmissionStatusResponse {
    fn from(submission: &Submission) -> Self {
        Self {
            id: submission.id,
            status: submission.status,
            label: submission.status.label(),
            is_complete: submission.is_complete(),
            test_summary: TestSummary::from_results(&submission.test_results),
            error_detail: submission.error_detail.clone(),
            metrics: submission.metrics,
            submitted_at: submission.submitted_at,
            judged_at: submission.judged_at,
        }
    }
}
