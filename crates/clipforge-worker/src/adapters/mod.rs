//! Stage adapters: the external capabilities the pipeline drives.
//!
//! Adapters are black boxes to the orchestrator. Their errors are reported
//! as stage failures carrying the full error chain.

mod ffmpeg;
mod ml_service;

pub use ffmpeg::FfmpegTrimmer;
pub use ml_service::{MlClipDetector, MlTranscriber};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use clipforge_models::{TimeRange, Transcript};

/// Speech-to-text over a local media file.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, media: &Path) -> anyhow::Result<Transcript>;
}

/// Finds clip-worthy ranges in a transcript.
#[async_trait]
pub trait ClipDetector: Send + Sync {
    async fn detect_clips(&self, transcript: &Transcript) -> anyhow::Result<Vec<TimeRange>>;
}

/// Writes one range of a media file to `output`.
#[async_trait]
pub trait Trimmer: Send + Sync {
    async fn trim(&self, media: &Path, range: TimeRange, output: &Path) -> anyhow::Result<()>;
}

/// The set of adapters selected at startup.
#[derive(Clone)]
pub struct StageAdapters {
    pub transcriber: Arc<dyn Transcriber>,
    pub detector: Arc<dyn ClipDetector>,
    pub trimmer: Arc<dyn Trimmer>,
}

impl StageAdapters {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        detector: Arc<dyn ClipDetector>,
        trimmer: Arc<dyn Trimmer>,
    ) -> Self {
        Self {
            transcriber,
            detector,
            trimmer,
        }
    }
}
