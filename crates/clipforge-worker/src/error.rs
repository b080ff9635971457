//! Worker and pipeline error types.

use std::fmt;
use thiserror::Error;

use clipforge_media::MediaError;
use clipforge_models::{JobId, TransitionError};

pub type WorkerResult<T> = Result<T, WorkerError>;
pub type StoreResult<T> = Result<T, StoreError>;

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Input,
    Download,
    Transcribe,
    Detect,
    Trim,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Download => "download",
            Stage::Transcribe => "transcribe",
            Stage::Detect => "detect",
            Stage::Trim => "trim",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons a job ends in `Failed`.
///
/// The `Display` output is stored as the job's error message and always
/// starts with the stage name.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PipelineError {
    #[error("input: {0}")]
    InvalidReference(String),

    #[error("download: timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("download: file too large ({size} bytes exceeds the size limit of {limit} bytes)")]
    DownloadTooLarge { size: u64, limit: u64 },

    #[error("download: {0}")]
    DownloadTransport(String),

    #[error("{stage}: {cause}")]
    StageFailure { stage: Stage, cause: String },
}

impl PipelineError {
    pub fn stage_failure(stage: Stage, cause: impl Into<String>) -> Self {
        Self::StageFailure {
            stage,
            cause: cause.into(),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::InvalidReference(_) => Stage::Input,
            PipelineError::DownloadTimeout(_)
            | PipelineError::DownloadTooLarge { .. }
            | PipelineError::DownloadTransport(_) => Stage::Download,
            PipelineError::StageFailure { stage, .. } => *stage,
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::InvalidReference(m) => PipelineError::InvalidReference(m),
            MediaError::DownloadTimeout(secs) => PipelineError::DownloadTimeout(secs),
            MediaError::DownloadTooLarge { size, limit } => {
                PipelineError::DownloadTooLarge { size, limit }
            }
            MediaError::DownloadTransport(m) => PipelineError::DownloadTransport(m),
            MediaError::Io(e) => PipelineError::DownloadTransport(e.to_string()),
            other => PipelineError::stage_failure(Stage::Download, other.to_string()),
        }
    }
}

/// Job Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error("Job already exists: {0}")]
    AlreadyExists(JobId),

    #[error("Job {0} is terminal and can no longer be updated")]
    Terminal(JobId),

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the worker to its callers.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid job transition: {0}")]
    Transition(#[from] TransitionError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("ML client error: {0}")]
    Ml(#[from] clipforge_ml_client::MlError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
