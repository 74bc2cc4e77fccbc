//! Admin handler implementations

use axum::{Json, extract::State};

use crate::{error::AppResult, state::AppState};

use super::response::DeadLettersResponse;

/// List submissions that ended in a system error, oldest first
pub async fn list_dead_letters(State(state): State<AppState>) -> AppResult<Json<DeadLettersResponse>> {
    let service = state.submissions();
    let dead_letters = service.dead_letters().list();

    Ok(Json(DeadLettersResponse {
        queue_depth: service.queue().depth(),
        total: dead_letters.len(),
        dead_letters,
    }))
}
