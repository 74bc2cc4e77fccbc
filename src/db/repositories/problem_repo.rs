//! Problem repository

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Problem, TestCase},
};

/// Repository for problem database operations
pub struct ProblemRepository;

#[derive(sqlx::FromRow)]
struct ProblemRow {
    id: Uuid,
    title: String,
    time_limit_ms: i64,
    memory_limit_mb: i64,
}

#[derive(sqlx::FromRow)]
struct TestCaseRow {
    input: String,
    expected_output: String,
    hidden: bool,
}

impl ProblemRepository {
    /// Insert or replace a problem together with its test cases
    pub async fn upsert(pool: &PgPool, problem: &Problem) -> AppResult<()> {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO problems (id, title, time_limit_ms, memory_limit_mb)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title,
                time_limit_ms = EXCLUDED.time_limit_ms,
                memory_limit_mb = EXCLUDED.memory_limit_mb
            "#,
        )
        .bind(problem.id)
        .bind(&problem.title)
        .bind(problem.time_limit_ms as i64)
        .bind(problem.memory_limit_mb as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query(r#"DELETE FROM test_cases WHERE problem_id = $1"#)
            .bind(problem.id)
            .execute(&mut *tx)
            .await?;

        for (position, case) in problem.test_cases.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO test_cases (problem_id, position, input, expected_output, hidden)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(problem.id)
            .bind(position as i32)
            .bind(&case.input)
            .bind(&case.expected_output)
            .bind(case.hidden)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Find problem by ID with its test cases in declared order
    pub async fn find_by_id(pool: &PgPool, id: &Uuid) -> AppResult<Option<Problem>> {
        let Some(row) = sqlx::query_as::<_, ProblemRow>(
            r#"SELECT id, title, time_limit_ms, memory_limit_mb FROM problems WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?
        else {
            return Ok(None);
        };

        let test_cases = sqlx::query_as::<_, TestCaseRow>(
            r#"
            SELECT input, expected_output, hidden
            FROM test_cases
            WHERE problem_id = $1
            ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|case| TestCase::new(case.input, case.expected_output, case.hidden))
        .collect();

        Ok(Some(Problem {
            id: row.id,
            title: row.title,
            time_limit_ms: row.time_limit_ms as u64,
            memory_limit_mb: row.memory_limit_mb as u64,
            test_cases,
        }))
    }
}
