//! Admin response DTOs

use serde::Serialize;

use crate::services::DeadLetter;

/// Dead-lettered submissions and current queue depth
#[derive(Debug, Serialize)]
pub struct DeadLettersResponse {
    pub queue_depth: usize,
    pub total: usize,
    pub dead_letters: Vec<DeadLetter>,
}
