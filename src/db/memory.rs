//! In-memory store
//!
//! Used when no database is configured, and by tests. Each conditional update
//! runs under the `DashMap` shard lock of its entry, which makes it atomic.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CounterDelta, Judgement, NewSubmission, Problem, ProblemStats, Submission,
        SubmissionStatus, TestResult, UserStats,
    },
};

use super::store::{ProblemCatalog, StatisticsStore, SubmissionStore};

/// Process-local implementation of every store trait
#[derive(Debug, Default)]
pub struct MemoryStore {
    submissions: DashMap<Uuid, Submission>,
    problems: DashMap<Uuid, Problem>,
    user_stats: DashMap<Uuid, UserStats>,
    problem_stats: DashMap<Uuid, ProblemStats>,
    solved: DashSet<(Uuid, Uuid)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a problem
    pub fn insert_problem(&self, problem: Problem) {
        self.problems.insert(problem.id, problem);
    }

    /// Load a JSON array of problems
    pub fn load_problems(&self, path: &Path) -> anyhow::Result<usize> {
        let raw = std::fs::read_to_string(path)?;
        let problems: Vec<Problem> = serde_json::from_str(&raw)?;
        let count = problems.len();
        for problem in problems {
            if let Err(reason) = problem.validate_for_judging() {
                tracing::warn!(problem_id = %problem.id, "{}", reason);
            }
            self.insert_problem(problem);
        }
        Ok(count)
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn create(&self, new: NewSubmission) -> AppResult<Submission> {
        let submission = Submission::pending(new);
        self.submissions.insert(submission.id, submission.clone());
        Ok(submission)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Submission>> {
        Ok(self.submissions.get(&id).map(|entry| entry.clone()))
    }

    async fn claim(&self, id: Uuid) -> AppResult<Option<Submission>> {
        let Some(mut entry) = self.submissions.get_mut(&id) else {
            return Ok(None);
        };
        if entry.status != SubmissionStatus::Pending {
            return Ok(None);
        }
        entry.status = SubmissionStatus::Running;
        entry.claimed_at = Some(Utc::now());
        Ok(Some(entry.clone()))
    }

    async fn append_result(&self, id: Uuid, result: &TestResult) -> AppResult<bool> {
        let Some(mut entry) = self.submissions.get_mut(&id) else {
            return Err(AppError::NotFound(format!("Submission {} not found", id)));
        };
        if entry.status != SubmissionStatus::Running {
            return Ok(false);
        }
        entry.test_results.push(result.clone());
        entry.claimed_at = Some(Utc::now());
        Ok(true)
    }

    async fn finalize(&self, id: Uuid, judgement: &Judgement) -> AppResult<Option<Submission>> {
        let Some(mut entry) = self.submissions.get_mut(&id) else {
            return Ok(None);
        };
        if !entry.status.can_transition_to(judgement.status)
            || entry.status != SubmissionStatus::Running
        {
            return Ok(None);
        }
        entry.status = judgement.status;
        entry.error_detail = judgement.error_detail.clone();
        entry.metrics = judgement.metrics;
        entry.judged_at = Some(Utc::now());
        Ok(Some(entry.clone()))
    }

    async fn mark_statistics_applied(&self, id: Uuid) -> AppResult<bool> {
        let Some(mut entry) = self.submissions.get_mut(&id) else {
            return Ok(false);
        };
        if entry.stats_applied || !entry.status.is_terminal() {
            return Ok(false);
        }
        entry.stats_applied = true;
        Ok(true)
    }

    async fn list_pending(&self) -> AppResult<Vec<Uuid>> {
        let mut pending: Vec<_> = self
            .submissions
            .iter()
            .filter(|entry| entry.status == SubmissionStatus::Pending)
            .map(|entry| (entry.submitted_at, entry.id))
            .collect();
        pending.sort();
        Ok(pending.into_iter().map(|(_, id)| id).collect())
    }

    async fn list_stale_running(&self, claimed_before: DateTime<Utc>) -> AppResult<Vec<Uuid>> {
        Ok(self
            .submissions
            .iter()
            .filter(|entry| {
                entry.status == SubmissionStatus::Running
                    && entry.claimed_at.is_some_and(|at| at < claimed_before)
            })
            .map(|entry| entry.id)
            .collect())
    }

    async fn terminal_history(&self, user_id: Uuid) -> AppResult<Vec<SubmissionStatus>> {
        let mut history: Vec<_> = self
            .submissions
            .iter()
            .filter(|entry| entry.user_id == user_id && entry.status.is_terminal())
            .filter_map(|entry| {
                entry
                    .judged_at
                    .map(|at| (at, entry.submitted_at, entry.status))
            })
            .collect();
        history.sort_by_key(|(judged_at, submitted_at, _)| (*judged_at, *submitted_at));
        Ok(history.into_iter().map(|(_, _, status)| status).collect())
    }
}

#[async_trait]
impl ProblemCatalog for MemoryStore {
    async fn find_problem(&self, id: Uuid) -> AppResult<Option<Problem>> {
        Ok(self.problems.get(&id).map(|entry| entry.clone()))
    }
}

#[async_trait]
impl StatisticsStore for MemoryStore {
    async fn increment_user(&self, user_id: Uuid, delta: CounterDelta) -> AppResult<()> {
        let mut stats = self
            .user_stats
            .entry(user_id)
            .or_insert_with(|| UserStats::new(user_id));
        stats.total_submissions += delta.total;
        stats.accepted_submissions += delta.accepted;
        stats.problems_solved += delta.solved;
        Ok(())
    }

    async fn increment_problem(&self, problem_id: Uuid, delta: CounterDelta) -> AppResult<()> {
        let mut stats = self
            .problem_stats
            .entry(problem_id)
            .or_insert_with(|| ProblemStats::new(problem_id));
        stats.total_submissions += delta.total;
        stats.accepted_submissions += delta.accepted;
        stats.solved_by += delta.solved;
        Ok(())
    }

    async fn record_solve(&self, user_id: Uuid, problem_id: Uuid) -> AppResult<bool> {
        Ok(self.solved.insert((user_id, problem_id)))
    }

    async fn update_streaks(&self, user_id: Uuid, current: u32, longest: u32) -> AppResult<()> {
        let mut stats = self
            .user_stats
            .entry(user_id)
            .or_insert_with(|| UserStats::new(user_id));
        stats.current_streak = current;
        stats.longest_streak = stats.longest_streak.max(longest);
        Ok(())
    }

    async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        Ok(self
            .user_stats
            .get(&user_id)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| UserStats::new(user_id)))
    }

    async fn problem_stats(&self, problem_id: Uuid) -> AppResult<ProblemStats> {
        Ok(self
            .problem_stats
            .get(&problem_id)
            .map(|entry| entry.clone())
            .unwrap_or_else(|| ProblemStats::new(problem_id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::models::{ExecutionMetrics, Language};

    fn new_submission() -> NewSubmission {
        NewSubmission {
            user_id: Uuid::new_v4(),
            problem_id: Uuid::new_v4(),
            language: Language::Python,
            source_code: "print(1)".to_string(),
        }
    }

    fn accepted() -> Judgement {
        Judgement {
            status: SubmissionStatus::Accepted,
            error_detail: None,
            metrics: ExecutionMetrics::default(),
        }
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_under_contention() {
        let store = Arc::new(MemoryStore::new());
        let id = store.create(new_submission()).await.unwrap().id;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.claim(id).await.unwrap().is_some() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_state_machine_is_enforced() {
        let store = MemoryStore::new();
        let id = store.create(new_submission()).await.unwrap().id;
        let result = TestResult::passed(0, "1".into(), 1, None);

        // Pending cannot be finalised or receive results
        assert!(store.finalize(id, &accepted()).await.unwrap().is_none());
        assert!(!store.append_result(id, &result).await.unwrap());

        store.claim(id).await.unwrap().unwrap();
        assert!(store.append_result(id, &result).await.unwrap());

        let done = store.finalize(id, &accepted()).await.unwrap().unwrap();
        assert_eq!(done.status, SubmissionStatus::Accepted);
        assert!(done.judged_at.is_some());

        // Terminal is frozen
        assert!(store.claim(id).await.unwrap().is_none());
        assert!(store.finalize(id, &accepted()).await.unwrap().is_none());
        assert!(!store.append_result(id, &result).await.unwrap());
        assert_eq!(store.find(id).await.unwrap().unwrap().test_results.len(), 1);
    }

    #[tokio::test]
    async fn test_appending_a_result_refreshes_the_lease() {
        let store = MemoryStore::new();
        let id = store.create(new_submission()).await.unwrap().id;
        store.claim(id).await.unwrap().unwrap();

        let long_ago = Utc::now() - chrono::Duration::minutes(30);
        store.submissions.get_mut(&id).unwrap().claimed_at = Some(long_ago);
        let cutoff = Utc::now() - chrono::Duration::minutes(10);
        assert_eq!(store.list_stale_running(cutoff).await.unwrap(), vec![id]);

        let result = TestResult::passed(0, "1".into(), 1, None);
        assert!(store.append_result(id, &result).await.unwrap());
        assert!(store.list_stale_running(cutoff).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statistics_marker_flips_once() {
        let store = MemoryStore::new();
        let id = store.create(new_submission()).await.unwrap().id;
        assert!(!store.mark_statistics_applied(id).await.unwrap());

        store.claim(id).await.unwrap();
        store.finalize(id, &accepted()).await.unwrap();
        assert!(store.mark_statistics_applied(id).await.unwrap());
        assert!(!store.mark_statistics_applied(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_longest_streak_never_decreases() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        store.update_streaks(user, 4, 4).await.unwrap();
        store.update_streaks(user, 0, 2).await.unwrap();

        let stats = store.user_stats(user).await.unwrap();
        assert_eq!(stats.current_streak, 0);
        assert_eq!(stats.longest_streak, 4);
    }

    #[test]
    fn test_load_problems_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("problems.json");
        std::fs::write(
            &path,
            r#"[{"id":"0b6f4bb2-2b2a-4e2c-a3a2-1f1e7c1c9d10","title":"Echo","test_cases":[
                {"input":"1","expected_output":"1"},
                {"input":"2","expected_output":"2","hidden":true},
                {"input":"3","expected_output":"3","hidden":true}]}]"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        assert_eq!(store.load_problems(&path).unwrap(), 1);
        let id = Uuid::parse_str("0b6f4bb2-2b2a-4e2c-a3a2-1f1e7c1c9d10").unwrap();
        let problem = tokio_test::block_on(store.find_problem(id)).unwrap().unwrap();
        assert_eq!(problem.test_cases.len(), 3);
    }
}
