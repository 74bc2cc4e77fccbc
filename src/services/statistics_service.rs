//! Statistics aggregation
//!
//! Applies a terminal submission to user and problem counters exactly once.
//! The submission's `stats_applied` marker decides who gets to apply it, and
//! every counter change is an atomic increment in the store.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    db::{StatisticsStore, SubmissionStore},
    error::AppResult,
    models::{CounterDelta, Submission, SubmissionStatus},
};

/// Current and longest run of consecutive accepted submissions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Streaks {
    pub current: u32,
    pub longest: u32,
}

impl Streaks {
    /// Compute streaks from terminal statuses in judging order
    pub fn from_history(history: &[SubmissionStatus]) -> Self {
        history.iter().fold(Self::default(), |mut streaks, status| {
            if status.is_accepted() {
                streaks.current += 1;
                streaks.longest = streaks.longest.max(streaks.current);
            } else {
                streaks.current = 0;
            }
            streaks
        })
    }
}

pub struct StatisticsService {
    submissions: Arc<dyn SubmissionStore>,
    stats: Arc<dyn StatisticsStore>,
    streak_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl StatisticsService {
    pub fn new(submissions: Arc<dyn SubmissionStore>, stats: Arc<dyn StatisticsStore>) -> Self {
        Self {
            submissions,
            stats,
            streak_locks: DashMap::new(),
        }
    }

    /// Apply a terminal submission to the aggregates.
    ///
    /// Returns `false` when the submission is not terminal or was already
    /// applied; calling this any number of times counts it once.
    pub async fn apply(&self, submission: &Submission) -> AppResult<bool> {
        if !submission.status.is_terminal() {
            return Ok(false);
        }
        if !self.submissions.mark_statistics_applied(submission.id).await? {
            tracing::debug!(submission_id = %submission.id, "Statistics already applied");
            return Ok(false);
        }

        let accepted = submission.status.is_accepted();
        let first_solve = accepted
            && self
                .stats
                .record_solve(submission.user_id, submission.problem_id)
                .await?;

        let delta = CounterDelta {
            total: 1,
            accepted: accepted as u64,
            solved: first_solve as u64,
        };
        self.stats.increment_user(submission.user_id, delta).await?;
        self.stats.increment_problem(submission.problem_id, delta).await?;

        self.refresh_streaks(submission.user_id).await?;

        tracing::debug!(
            submission_id = %submission.id,
            user_id = %submission.user_id,
            status = submission.status.as_str(),
            first_solve,
            "Statistics applied"
        );
        Ok(true)
    }

    /// Recompute streaks from the authoritative history.
    ///
    /// Serialised per user so two finishing submissions cannot write their
    /// snapshots out of order. The user's lock is dropped from the map once
    /// nobody else holds or waits on it.
    async fn refresh_streaks(&self, user_id: Uuid) -> AppResult<()> {
        let lock = self
            .streak_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let result = {
            let _guard = lock.lock().await;
            self.write_streaks(user_id).await
        };
        drop(lock);

        // Clones are only taken under the shard lock, so a count of one is final
        self.streak_locks
            .remove_if(&user_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }

    async fn write_streaks(&self, user_id: Uuid) -> AppResult<()> {
        let history = self.submissions.terminal_history(user_id).await?;
        let streaks = Streaks::from_history(&history);
        self.stats
            .update_streaks(user_id, streaks.current, streaks.longest)
            .await
    }
}
