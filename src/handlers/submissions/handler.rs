//! Submission handler implementations

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;
use validator::Validate;

use crate::{error::AppResult, state::AppState};

use super::{
    request::CreateSubmissionRequest,
    response::{CreateSubmissionResponse, SubmissionStatusResponse},
};

/// Create a new submission and queue it for judging
pub async fn create_submission(
    State(state): State<AppState>,
    Json(payload): Json<CreateSubmissionRequest>,
) -> AppResult<(StatusCode, Json<CreateSubmissionResponse>)> {
    payload.validate()?;

    let submission = state
        .submissions()
        .submit(
            payload.user_id,
            payload.source_code,
            &payload.language,
            payload.problem_id,
        )
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(CreateSubmissionResponse {
            id: submission.id,
            status: submission.status,
            message: "Submission received and queued for judging".to_string(),
        }),
    ))
}

/// Poll the judging status of a submission
pub async fn get_submission_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<SubmissionStatusResponse>> {
    let status = state.submissions().get_status(id).await?;
    Ok(Json(status))
}
