//! Aggregate counters written by the statistics aggregator

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-user judging statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: Uuid,
    pub total_submissions: u64,
    pub accepted_submissions: u64,
    pub problems_solved: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
}

impl UserStats {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            ..Default::default()
        }
    }

    /// Accepted share of all submissions, in percent
    pub fn acceptance_rate(&self) -> f64 {
        acceptance_rate(self.accepted_submissions, self.total_submissions)
    }
}

/// Per-problem judging statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProblemStats {
    pub problem_id: Uuid,
    pub total_submissions: u64,
    pub accepted_submissions: u64,
    pub solved_by: u64,
}

impl ProblemStats {
    pub fn new(problem_id: Uuid) -> Self {
        Self {
            problem_id,
            ..Default::default()
        }
    }

    pub fn acceptance_rate(&self) -> f64 {
        acceptance_rate(self.accepted_submissions, self.total_submissions)
    }
}

/// Increments applied atomically at the persistence boundary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub total: u64,
    pub accepted: u64,
    pub solved: u64,
}

fn acceptance_rate(accepted: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        (accepted as f64 / total as f64 * 10000.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptance_rate() {
        let mut stats = UserStats::new(Uuid::new_v4());
        assert_eq!(stats.acceptance_rate(), 0.0);

        stats.total_submissions = 3;
        stats.accepted_submissions = 1;
        assert_eq!(stats.acceptance_rate(), 33.33);
    }
}
