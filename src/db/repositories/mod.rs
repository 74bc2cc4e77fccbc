//! Database repositories
//!
//! Repositories handle all direct database interactions. [`PgStore`] exposes
//! them through the store traits the services depend on.

pub mod problem_repo;
pub mod statistics_repo;
pub mod submission_repo;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

pub use problem_repo::ProblemRepository;
pub use statistics_repo::StatisticsRepository;
pub use submission_repo::SubmissionRepository;

use crate::{
    error::AppResult,
    models::{
        CounterDelta, Judgement, NewSubmission, Problem, ProblemStats, Submission,
        SubmissionStatus, TestResult, UserStats,
    },
};

use super::store::{ProblemCatalog, StatisticsStore, SubmissionStore};

/// PostgreSQL-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubmissionStore for PgStore {
    async fn create(&self, new: NewSubmission) -> AppResult<Submission> {
        SubmissionRepository::create(&self.pool, new).await
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Submission>> {
        SubmissionRepository::find_by_id(&self.pool, &id).await
    }

    async fn claim(&self, id: Uuid) -> AppResult<Option<Submission>> {
        SubmissionRepository::claim(&self.pool, &id).await
    }

    async fn append_result(&self, id: Uuid, result: &TestResult) -> AppResult<bool> {
        SubmissionRepository::append_result(&self.pool, &id, result).await
    }

    async fn finalize(&self, id: Uuid, judgement: &Judgement) -> AppResult<Option<Submission>> {
        SubmissionRepository::finalize(&self.pool, &id, judgement).await
    }

    async fn mark_statistics_applied(&self, id: Uuid) -> AppResult<bool> {
        SubmissionRepository::mark_statistics_applied(&self.pool, &id).await
    }

    async fn list_pending(&self) -> AppResult<Vec<Uuid>> {
        SubmissionRepository::list_pending(&self.pool).await
    }

    async fn list_stale_running(&self, claimed_before: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        SubmissionRepository::list_stale_running(&self.pool, claimed_before).await
    }

    async fn terminal_history(&self, user_id: Uuid) -> AppResult<Vec<SubmissionStatus>> {
        SubmissionRepository::terminal_history(&self.pool, &user_id).await
    }
}

#[async_trait]
impl ProblemCatalog for PgStore {
    async fn find_problem(&self, id: Uuid) -> AppResult<Option<Problem>> {
        ProblemRepository::find_by_id(&self.pool, &id).await
    }
}

#[async_trait]
impl StatisticsStore for PgStore {
    async fn increment_user(&self, user_id: Uuid, delta: CounterDelta) -> AppResult<()> {
        StatisticsRepository::increment_user(&self.pool, &user_id, delta).await
    }

    async fn increment_problem(&self, problem_id: Uuid, delta: CounterDelta) -> AppResult<()> {
        StatisticsRepository::increment_problem(&self.pool, &problem_id, delta).await
    }

    async fn record_solve(&self, user_id: Uuid, problem_id: Uuid) -> AppResult<bool> {
        StatisticsRepository::record_solve(&self.pool, &user_id, &problem_id).await
    }

    async fn update_streaks(&self, user_id: Uuid, current: u32, longest: u32) -> AppResult<()> {
        StatisticsRepository::update_streaks(&self.pool, &user_id, current, longest).await
    }

    async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        StatisticsRepository::user_stats(&self.pool, &user_id).await
    }

    async fn problem_stats(&self, problem_id: Uuid) -> AppResult<ProblemStats> {
        StatisticsRepository::problem_stats(&self.pool, &problem_id).await
    }
}
