//! Statistics repository
//!
//! Counters are only ever changed with in-place increments so concurrent
//! writers cannot lose updates.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CounterDelta, ProblemStats, UserStats},
};

/// Repository for aggregate statistics
pub struct StatisticsRepository;

#[derive(sqlx::FromRow)]
struct UserStatsRow {
    user_id: Uuid,
    total_submissions: i64,
    accepted_submissions: i64,
    problems_solved: i64,
    current_streak: i32,
    longest_streak: i32,
}

#[derive(sqlx::FromRow)]
struct ProblemStatsRow {
    problem_id: Uuid,
    total_submissions: i64,
    accepted_submissions: i64,
    solved_by: i64,
}

impl StatisticsRepository {
    pub async fn increment_user(pool: &PgPool, user_id: &Uuid, delta: CounterDelta) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_statistics (user_id, total_submissions, accepted_submissions, problems_solved)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE
            SET total_submissions = user_statistics.total_submissions + EXCLUDED.total_submissions,
                accepted_submissions = user_statistics.accepted_submissions + EXCLUDED.accepted_submissions,
                problems_solved = user_statistics.problems_solved + EXCLUDED.problems_solved
            "#,
        )
        .bind(user_id)
        .bind(delta.total as i64)
        .bind(delta.accepted as i64)
        .bind(delta.solved as i64)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn increment_problem(
        pool: &PgPool,
        problem_id: &Uuid,
        delta: CounterDelta,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO problem_statistics (problem_id, total_submissions, accepted_submissions, solved_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (problem_id) DO UPDATE
            SET total_submissions = problem_statistics.total_submissions + EXCLUDED.total_submissions,
                accepted_submissions = problem_statistics.accepted_submissions + EXCLUDED.accepted_submissions,
                solved_by = problem_statistics.solved_by + EXCLUDED.solved_by
            "#,
        )
        .bind(problem_id)
        .bind(delta.total as i64)
        .bind(delta.accepted as i64)
        .bind(delta.solved as i64)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Insert into the solved set; true when this is the first solve
    pub async fn record_solve(pool: &PgPool, user_id: &Uuid, problem_id: &Uuid) -> AppResult<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO solved_problems (user_id, problem_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, problem_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(problem_id)
        .execute(pool)
        .await?
        .rows_affected();

        Ok(inserted == 1)
    }

    pub async fn update_streaks(
        pool: &PgPool,
        user_id: &Uuid,
        current: u32,
        longest: u32,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_statistics (user_id, current_streak, longest_streak)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id) DO UPDATE
            SET current_streak = EXCLUDED.current_streak,
                longest_streak = GREATEST(user_statistics.longest_streak, EXCLUDED.longest_streak)
            "#,
        )
        .bind(user_id)
        .bind(current as i32)
        .bind(longest as i32)
        .execute(pool)
        .await?;

        Ok(())
    }

    pub async fn user_stats(pool: &PgPool, user_id: &Uuid) -> AppResult<UserStats> {
        let row = sqlx::query_as::<_, UserStatsRow>(
            r#"SELECT * FROM user_statistics WHERE user_id = $1"#,
        )
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            Some(row) => UserStats {
                user_id: row.user_id,
                total_submissions: row.total_submissions as u64,
                accepted_submissions: row.accepted_submissions as u64,
                problems_solved: row.problems_solved as u64,
                current_streak: row.current_streak as u32,
                longest_streak: row.longest_streak as u32,
            },
            None => UserStats::new(*user_id),
        })
    }

    pub async fn problem_stats(pool: &PgPool, problem_id: &Uuid) -> AppResult<ProblemStats> {
        let row = sqlx::query_as::<_, ProblemStatsRow>(
            r#"SELECT * FROM problem_statistics WHERE problem_id = $1"#,
        )
        .bind(problem_id)
        .fetch_optional(pool)
        .await?;

        Ok(match row {
            Some(row) => ProblemStats {
                problem_id: row.problem_id,
                total_submissions: row.total_submissions as u64,
                accepted_submissions: row.accepted_submissions as u64,
                solved_by: row.solved_by as u64,
            },
            None => ProblemStats::new(*problem_id),
        })
    }
}
