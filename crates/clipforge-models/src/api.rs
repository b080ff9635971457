//! Request and response shapes rendered by the HTTP layer.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::clip::Clip;
use crate::job::{Job, JobStage, PublicStatus};

/// Request to generate clips from a video.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerateClipsRequest {
    /// Local path OR http(s) URL of the video
    #[validate(length(min = 1, max = 2048))]
    pub video_path: String,
}

/// Response returned when a job is accepted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerateClipsResponse {
    pub job_id: String,
    pub status: PublicStatus,
    pub message: String,
}

impl GenerateClipsResponse {
    pub fn accepted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: PublicStatus::Pending,
            message: "Clip generation job queued successfully. Use /api/clips/status/{job_id} to check progress."
                .to_string(),
        }
    }
}

/// Job record as exposed to API callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobView {
    pub job_id: String,
    pub status: PublicStatus,
    pub status_message: Option<String>,
    /// Present once the job has completed (possibly empty)
    pub generated_clips: Option<Vec<Clip>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Job> for JobView {
    fn from(job: &Job) -> Self {
        let generated_clips = match job.stage {
            JobStage::Completed => Some(job.clips.clone()),
            _ => None,
        };

        Self {
            job_id: job.id.to_string(),
            status: job.public_status(),
            status_message: Some(job.status_message.clone()).filter(|m| !m.is_empty()),
            generated_clips,
            error_message: job.error_message.clone(),
            created_at: job.created_at,
            updated_at: job.updated_at,
            completed_at: job.completed_at,
        }
    }
}
