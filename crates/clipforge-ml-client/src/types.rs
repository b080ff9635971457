//! Wire types for the ML service.

use serde::{Deserialize, Serialize};

use clipforge_models::{TimeRange, Transcript};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Local path readable by the service
    pub media_path: String,
    /// ISO 639-1 language hint; detected when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindClipsRequest {
    pub transcript: Transcript,
}

/// One detected clip boundary as returned by the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClipBoundary {
    pub start_time: f64,
    pub end_time: f64,
}

impl From<ClipBoundary> for TimeRange {
    fn from(b: ClipBoundary) -> Self {
        TimeRange {
            start: b.start_time,
            end: b.end_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindClipsResponse {
    #[serde(default)]
    pub clips: Vec<ClipBoundary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
