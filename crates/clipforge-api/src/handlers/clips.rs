//! Clip generation job handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::info;
use validator::Validate;

use clipforge_models::{GenerateClipsRequest, GenerateClipsResponse, JobId, JobView};

use crate::error::ApiResult;
use crate::state::AppState;

/// Accept a job; processing continues in the background.
pub async fn generate_clips(
    State(state): State<AppState>,
    Json(request): Json<GenerateClipsRequest>,
) -> ApiResult<(StatusCode, Json<GenerateClipsResponse>)> {
    request.validate()?;

    let job_id = state.dispatcher.submit(&request.video_path).await?;
    info!(job_id = %job_id, video_path = %request.video_path, "Clip generation requested");

    Ok((
        StatusCode::ACCEPTED,
        Json(GenerateClipsResponse::accepted(job_id.to_string())),
    ))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job = state.dispatcher.lookup(&JobId::from_string(job_id)).await?;
    Ok(Json(JobView::from(&job)))
}

/// Delete a job record and its clip files.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<StatusCode> {
    state.dispatcher.delete(&JobId::from_string(job_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
