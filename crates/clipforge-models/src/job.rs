//! Job definitions and the per-job state machine.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::clip::Clip;
use crate::error::TransitionError;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pipeline stage a job is currently in.
///
/// Stages only move forward; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Waiting for the orchestrator to pick the job up
    #[default]
    Pending,
    /// Remote media is being fetched into the cache
    Downloading,
    /// Speech-to-text is running
    Transcribing,
    /// Clip boundaries are being detected
    Detecting,
    /// Detected ranges are being cut into clip files
    Trimming,
    /// All clips were produced
    Completed,
    /// A stage failed
    Failed,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Pending => "pending",
            JobStage::Downloading => "downloading",
            JobStage::Transcribing => "transcribing",
            JobStage::Detecting => "detecting",
            JobStage::Trimming => "trimming",
            JobStage::Completed => "completed",
            JobStage::Failed => "failed",
        }
    }

    /// Position in the pipeline. Both terminal stages share the last slot.
    fn rank(&self) -> u8 {
        match self {
            JobStage::Pending => 0,
            JobStage::Downloading => 1,
            JobStage::Transcribing => 2,
            JobStage::Detecting => 3,
            JobStage::Trimming => 4,
            JobStage::Completed | JobStage::Failed => 5,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStage::Completed | JobStage::Failed)
    }

    /// Status value exposed to API callers.
    pub fn public_status(&self) -> PublicStatus {
        match self {
            JobStage::Pending => PublicStatus::Pending,
            JobStage::Downloading
            | JobStage::Transcribing
            | JobStage::Detecting
            | JobStage::Trimming => PublicStatus::Processing,
            JobStage::Completed => PublicStatus::Completed,
            JobStage::Failed => PublicStatus::Failed,
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Externally visible job status.
///
/// All working stages collapse into `Processing`; the detail lives in the
/// job's status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublicStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl PublicStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublicStatus::Pending => "pending",
            PublicStatus::Processing => "processing",
            PublicStatus::Completed => "completed",
            PublicStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PublicStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status message written when a job is created.
pub const PENDING_MESSAGE: &str = "waiting to be processed";

/// A clip generation job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Current pipeline stage
    #[serde(default)]
    pub stage: JobStage,

    /// Human-readable progress, overwritten on every transition
    pub status_message: String,

    /// Reference submitted by the caller (local path or URL)
    pub input_ref: String,

    /// Local media path, set once the input has been resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_media_path: Option<String>,

    /// Generated clips, published as one set on completion
    #[serde(default)]
    pub clips: Vec<Clip>,

    /// Failure reason (only when failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Set once, when the job reaches a terminal stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a new pending job for the given input reference.
    pub fn new(input_ref: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            stage: JobStage::Pending,
            status_message: PENDING_MESSAGE.to_string(),
            input_ref: input_ref.into(),
            resolved_media_path: None,
            clips: Vec::new(),
            error_message: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.stage.is_terminal()
    }

    pub fn public_status(&self) -> PublicStatus {
        self.stage.public_status()
    }

    /// Move the job forward to a working stage.
    ///
    /// Skipping stages is allowed (a local input goes straight from
    /// `Pending` to `Transcribing`); going back or standing still is not.
    pub fn advance(
        &mut self,
        stage: JobStage,
        message: impl Into<String>,
    ) -> Result<(), TransitionError> {
        self.ensure_open()?;
        if stage.is_terminal() {
            return Err(TransitionError::TerminalViaAdvance(stage));
        }
        if stage.rank() <= self.stage.rank() {
            return Err(TransitionError::Backwards {
                from: self.stage,
                to: stage,
            });
        }

        self.stage = stage;
        self.status_message = message.into();
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record where the input media lives locally.
    pub fn set_resolved_media(&mut self, path: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        self.resolved_media_path = Some(path.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark job as completed, publishing the whole clip set at once.
    pub fn complete(&mut self, clips: Vec<Clip>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let now = Utc::now();
        self.status_message = format!("completed: {} clips generated", clips.len());
        self.clips = clips;
        self.stage = JobStage::Completed;
        self.error_message = None;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.ensure_open()?;
        let error = error.into();
        let now = Utc::now();
        self.status_message = format!("error: {}", error);
        self.error_message = Some(error);
        self.clips = Vec::new();
        self.stage = JobStage::Failed;
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), TransitionError> {
        if self.stage.is_terminal() {
            return Err(TransitionError::AlreadyTerminal(self.stage));
        }
        Ok(())
    }
}
