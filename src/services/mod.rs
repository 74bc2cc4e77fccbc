//! Business logic services

pub mod dead_letters;
pub mod statistics_service;
pub mod submission_service;
pub mod worker;

pub use dead_letters::{DeadLetter, DeadLetterLog};
pub use statistics_service::{StatisticsService, Streaks};
pub use submission_service::SubmissionService;
pub use worker::{JudgePool, JudgeQueue};
