//! Submission repository

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        ExecutionMetrics, Judgement, Language, NewSubmission, Submission, SubmissionStatus, TestResult,
        TestResultStatus,
    },
};

/// Repository for submission database operations
pub struct SubmissionRepository;

#[derive(sqlx::FromRow)]
struct SubmissionRow {
    id: Uuid,
    user_id: Uuid,
    problem_id: Uuid,
    language: String,
    source_code: String,
    status: String,
    error_detail: Option<String>,
    max_time_ms: Option<i64>,
    max_memory_kb: Option<i64>,
    submitted_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    judged_at: Option<DateTime<Utc>>,
    stats_applied: bool,
}

#[derive(sqlx::FromRow)]
struct TestResultRow {
    test_index: i32,
    status: String,
    actual_output: String,
    time_ms: i64,
    memory_kb: Option<i64>,
    error_message: Option<String>,
}

impl SubmissionRow {
    fn into_submission(self, test_results: Vec<TestResult>) -> AppResult<Submission> {
        let language = self
            .language
            .parse::<Language>()
            .map_err(AppError::Database)?;
        let status = self
            .status
            .parse::<SubmissionStatus>()
            .map_err(|s| AppError::Database(format!("Unknown status '{}'", s)))?;

        Ok(Submission {
            id: self.id,
            user_id: self.user_id,
            problem_id: self.problem_id,
            language,
            source_code: self.source_code,
            status,
            test_results,
            error_detail: self.error_detail,
            metrics: ExecutionMetrics {
                max_time_ms: self.max_time_ms.map(|v| v as u64),
                max_memory_kb: self.max_memory_kb.map(|v| v as u64),
            },
            submitted_at: self.submitted_at,
            claimed_at: self.claimed_at,
            judged_at: self.judged_at,
            stats_applied: self.stats_applied,
        })
    }
}

impl TryFrom<TestResultRow> for TestResult {
    type Error = AppError;

    fn try_from(row: TestResultRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse::<TestResultStatus>()
            .map_err(|s| AppError::Database(format!("Unknown test status '{}'", s)))?;

        Ok(TestResult {
            index: row.test_index as u32,
            status,
            actual_output: row.actual_output,
            time_ms: row.time_ms as u64,
            memory_kb: row.memory_kb.map(|v| v as u64),
            error_message: row.error_message,
        })
    }
}

impl SubmissionRepository {
    /// Create a new pending submission
    pub async fn create(pool: &PgPool, new: NewSubmission) -> AppResult<Submission> {
        let submission = Submission::pending(new);

        sqlx::query(
            r#"
            INSERT INTO submissions (id, user_id, problem_id, language, source_code, status, submitted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(submission.id)
        .bind(submission.user_id)
        .bind(submission.problem_id)
        .bind(submission.language.as_str())
        .bind(&submission.source_code)
        .bind(submission.status.as_str())
        .bind(submission.submitted_at)
        .execute(pool)
        .await?;

        Ok(submission)
    }

    /// Find submission by ID, with its test results in order
    pub async fn find_by_id(pool: &PgPool, id: &Uuid) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(r#"SELECT * FROM submissions WHERE id = $1"#)
            .bind(id)
            .fetch_optional(pool)
            .await?;

        match row {
            Some(row) => {
                let results = Self::test_results(pool, id).await?;
                Ok(Some(row.into_submission(results)?))
            }
            None => Ok(None),
        }
    }

    async fn test_results(pool: &PgPool, id: &Uuid) -> AppResult<Vec<TestResult>> {
        let rows = sqlx::query_as::<_, TestResultRow>(
            r#"
            SELECT test_index, status, actual_output, time_ms, memory_kb, error_message
            FROM submission_test_results
            WHERE submission_id = $1
            ORDER BY test_index
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?;

        rows.into_iter().map(TestResult::try_from).collect()
    }

    /// Move a pending submission to running
    pub async fn claim(pool: &PgPool, id: &Uuid) -> AppResult<Option<Submission>> {
        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            UPDATE submissions
            SET status = 'running', claimed_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        row.map(|row| row.into_submission(Vec::new())).transpose()
    }

    /// Append a test result while the submission is running, refreshing its lease
    pub async fn append_result(pool: &PgPool, id: &Uuid, result: &TestResult) -> AppResult<bool> {
        let inserted = sqlx::query(
            r#"
            WITH lease AS (
                UPDATE submissions
                SET claimed_at = NOW()
                WHERE id = $1 AND status = 'running'
                RETURNING id
            )
            INSERT INTO submission_test_results
                (submission_id, test_index, status, actual_output, time_ms, memory_kb, error_message)
            SELECT lease.id, $2, $3, $4, $5, $6, $7
            FROM lease
            ON CONFLICT (submission_id, test_index) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(result.index as i32)
        .bind(result.status.as_str())
        .bind(&result.actual_output)
        .bind(result.time_ms as i64)
        .bind(result.memory_kb.map(|v| v as i64))
        .bind(result.error_message.as_deref())
        .execute(pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    /// Write the terminal verdict of a running submission
    pub async fn finalize(
        pool: &PgPool,
        id: &Uuid,
        judgement: &Judgement,
    ) -> AppResult<Option<Submission>> {
        if !judgement.status.is_terminal() {
            return Err(AppError::Validation(format!(
                "{} is not a terminal status",
                judgement.status.as_str()
            )));
        }

        let row = sqlx::query_as::<_, SubmissionRow>(
            r#"
            UPDATE submissions
            SET
                status = $2,
                error_detail = $3,
                max_time_ms = $4,
                max_memory_kb = $5,
                judged_at = NOW()
            WHERE id = $1 AND status = 'running'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(judgement.status.as_str())
        .bind(judgement.error_detail.as_deref())
        .bind(judgement.metrics.max_time_ms.map(|v| v as i64))
        .bind(judgement.metrics.max_memory_kb.map(|v| v as i64))
        .fetch_optional(pool)
        .await?;

        match row {
            Some(row) => {
                let results = Self::test_results(pool, id).await?;
                Ok(Some(row.into_submission(results)?))
            }
            None => Ok(None),
        }
    }

    /// Flip the statistics marker; true only for the first caller
    pub async fn mark_statistics_applied(pool: &PgPool, id: &Uuid) -> AppResult<bool> {
        let updated = sqlx::query(
            r#"
            UPDATE submissions
            SET stats_applied = TRUE
            WHERE id = $1
              AND stats_applied = FALSE
              AND status NOT IN ('pending', 'running')
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(updated == 1)
    }

    /// Pending submission ids, oldest first
    pub async fn list_pending(pool: &PgPool) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"SELECT id FROM submissions WHERE status = 'pending' ORDER BY submitted_at"#,
        )
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Running submissions whose lease started before `claimed_before`
    pub async fn list_stale_running(
        pool: &PgPool,
        claimed_before: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM submissions
            WHERE status = 'running' AND claimed_at < $1
            "#,
        )
        .bind(claimed_before)
        .fetch_all(pool)
        .await?;

        Ok(ids)
    }

    /// Terminal statuses of a user's submissions ordered by judging time
    pub async fn terminal_history(pool: &PgPool, user_id: &Uuid) -> AppResult<Vec<SubmissionStatus>> {
        let statuses = sqlx::query_scalar::<_, String>(
            r#"
            SELECT status FROM submissions
            WHERE user_id = $1 AND judged_at IS NOT NULL
            ORDER BY judged_at, submitted_at
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;

        Ok(statuses
            .iter()
            .filter_map(|s| s.parse::<SubmissionStatus>().ok())
            .filter(SubmissionStatus::is_terminal)
            .collect())
    }
}
