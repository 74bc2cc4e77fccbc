//! Problem handler implementations

use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;
use validator::Validate;

use crate::{db::StatisticsStore, error::AppResult, state::AppState};

use super::{
    request::RunCodeRequest,
    response::{ProblemStatsResponse, RunCodeResponse},
};

/// Run code against the problem's sample cases without submitting
pub async fn run_code(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RunCodeRequest>,
) -> AppResult<Json<RunCodeResponse>> {
    payload.validate()?;

    let report = state
        .submissions()
        .run_preview(&payload.source_code, &payload.language, id)
        .await?;

    Ok(Json(report))
}

/// Aggregate judging statistics for a problem
pub async fn get_problem_stats(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ProblemStatsResponse>> {
    let stats = state.statistics().problem_stats(id).await?;
    Ok(Json(stats.into()))
}
