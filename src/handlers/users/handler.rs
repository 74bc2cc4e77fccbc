//! User handler implementations

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;

use crate::{db::StatisticsStore, error::AppResult, state::AppState};

use super::response::UserStatsResponse;

/// Get user statistics
pub async fn get_user_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<UserStatsResponse>> {
    let stats = state.statistics().user_stats(id).await?;
    Ok(Json(stats.into()))
}
