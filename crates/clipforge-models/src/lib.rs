//! Shared data models for the ClipForge backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their pipeline stages and the externally visible status
//! - Detected time ranges and generated clips
//! - Transcripts passed between pipeline stages
//! - HTTP request/response shapes

pub mod api;
pub mod clip;
pub mod error;
pub mod job;
pub mod transcript;

// Re-export common types
pub use api::{GenerateClipsRequest, GenerateClipsResponse, JobView};
pub use clip::{Clip, TimeRange};
pub use error::{ModelError, TransitionError};
pub use job::{Job, JobId, JobStage, PublicStatus, PENDING_MESSAGE};
pub use transcript::{Transcript, TranscriptSegment};
