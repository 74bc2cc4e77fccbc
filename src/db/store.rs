//! Persistence seams used by the judging services
//!
//! Every state change that can race is a single conditional operation here:
//! claiming a submission, finalising it, flipping its statistics marker, and
//! incrementing counters.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        CounterDelta, Judgement, NewSubmission, Problem, ProblemStats, Submission,
        SubmissionStatus, TestResult, UserStats,
    },
};

/// Submission records and their state machine
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Insert a new `Pending` submission
    async fn create(&self, new: NewSubmission) -> AppResult<Submission>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Submission>>;

    /// Atomically move `Pending -> Running`; `None` if someone else got it
    async fn claim(&self, id: Uuid) -> AppResult<Option<Submission>>;

    /// Append a result and refresh the lease; ignored (returns `false`) unless
    /// the submission is `Running`
    async fn append_result(&self, id: Uuid, result: &TestResult) -> AppResult<bool>;

    /// Atomically move `Running -> terminal`; `None` if it was not `Running`
    async fn finalize(&self, id: Uuid, judgement: &Judgement) -> AppResult<Option<Submission>>;

    /// Flip the statistics marker of a terminal submission; `true` only for the
    /// caller that flipped it
    async fn mark_statistics_applied(&self, id: Uuid) -> AppResult<bool>;

    /// Ids of all `Pending` submissions, oldest first
    async fn list_pending(&self) -> AppResult<Vec<Uuid>>;

    /// Ids of `Running` submissions claimed before `claimed_before`
    async fn list_stale_running(&self, claimed_before: DateTime<Utc>) -> AppResult<Vec<Uuid>>;

    /// Terminal statuses of a user's submissions, ordered by judging time
    async fn terminal_history(&self, user_id: Uuid) -> AppResult<Vec<SubmissionStatus>>;
}

/// Read-only problem lookup
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProblemCatalog: Send + Sync {
    async fn find_problem(&self, id: Uuid) -> AppResult<Option<Problem>>;
}

/// Aggregate counters on users and problems
#[async_trait]
pub trait StatisticsStore: Send + Sync {
    async fn increment_user(&self, user_id: Uuid, delta: CounterDelta) -> AppResult<()>;

    async fn increment_problem(&self, problem_id: Uuid, delta: CounterDelta) -> AppResult<()>;

    /// Record a first solve of `problem_id` by `user_id`; `false` if already solved
    async fn record_solve(&self, user_id: Uuid, problem_id: Uuid) -> AppResult<bool>;

    /// Store the current streak; the longest streak never decreases
    async fn update_streaks(&self, user_id: Uuid, current: u32, longest: u32) -> AppResult<()>;

    async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats>;

    async fn problem_stats(&self, problem_id: Uuid) -> AppResult<ProblemStats>;
}
