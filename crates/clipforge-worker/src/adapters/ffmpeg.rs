use async_trait::async_trait;
use std::path::Path;

use clipforge_media::{check_ffmpeg, trim_clip, TrimOptions};
use clipforge_models::TimeRange;

use super::Trimmer;
use crate::error::{WorkerError, WorkerResult};

/// Trims clips with a local FFmpeg binary.
pub struct FfmpegTrimmer {
    options: TrimOptions,
}

impl FfmpegTrimmer {
    /// Fails when FFmpeg is not installed.
    pub fn new(options: TrimOptions) -> WorkerResult<Self> {
        let binary = check_ffmpeg()
            .map_err(|_| WorkerError::config("ffmpeg binary not found in PATH"))?;
        tracing::info!("Using FFmpeg at {}", binary.display());
        Ok(Self { options })
    }
}

#[async_trait]
impl Trimmer for FfmpegTrimmer {
    async fn trim(&self, media: &Path, range: TimeRange, output: &Path) -> anyhow::Result<()> {
        trim_clip(media, output, range, &self.options).await?;
        Ok(())
    }
}
