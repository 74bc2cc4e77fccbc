//! User response DTOs

use serde::Serialize;
use uuid::Uuid;

use crate::models::UserStats;

/// User judging statistics
#[derive(Debug, Serialize)]
pub struct UserStatsResponse {
    pub user_id: Uuid,
    pub total_submissions: u64,
    pub accepted_submissions: u64,
    pub problems_solved: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub acceptance_rate: f64,
}

impl From<UserStats> for UserStatsResponse {
    fn from(stats: UserStats) -> Self {
        Self {
            acceptance_rate: stats.acceptance_rate(),
            user_id: stats.user_id,
            total_submissions: stats.total_submissions,
            accepted_submissions: stats.accepted_submissions,
            problems_solved: stats.problems_solved,
            current_streak: stats.current_streak,
            longest_streak: stats.longest_streak,
        }
    }
}
