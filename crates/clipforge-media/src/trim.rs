//! Cutting a time range out of a media file.

use std::path::Path;
use std::time::Duration;
use tracing::info;

use clipforge_models::TimeRange;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::remove_if_exists;

/// Encoding settings for trimmed clips.
#[derive(Debug, Clone)]
pub struct TrimOptions {
    /// Stream copy instead of re-encoding. Faster, but cuts snap to keyframes.
    pub stream_copy: bool,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub crf: u8,
    /// Per-clip FFmpeg timeout
    pub timeout: Option<Duration>,
}

impl Default for TrimOptions {
    fn default() -> Self {
        Self {
            stream_copy: false,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "veryfast".to_string(),
            crf: 23,
            timeout: None,
        }
    }
}

impl TrimOptions {
    fn command(&self, input: &Path, output: &Path, range: TimeRange) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output)
            .seek(range.start)
            .duration(range.duration());

        if self.stream_copy {
            cmd.codec_copy()
        } else {
            cmd.video_codec(&self.video_codec)
                .audio_codec(&self.audio_codec)
                .preset(&self.preset)
                .crf(self.crf)
        }
    }
}

/// Write `range` of `input` to `output`.
///
/// A partially written output is removed when FFmpeg fails.
pub async fn trim_clip(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    range: TimeRange,
    options: &TrimOptions,
) -> MediaResult<()> {
    let input = input.as_ref();
    let output = output.as_ref();

    if !input.exists() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    range
        .validate()
        .map_err(|e| MediaError::ffmpeg_failed(e.to_string(), None, None))?;

    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut runner = FfmpegRunner::new();
    if let Some(timeout) = options.timeout {
        runner = runner.with_timeout(timeout);
    }

    let cmd = options.command(input, output, range);
    if let Err(e) = runner.run(&cmd).await {
        remove_if_exists(output).await;
        return Err(e);
    }

    if !output.exists() {
        return Err(MediaError::ffmpeg_failed(
            "FFmpeg produced no output file",
            None,
            None,
        ));
    }

    info!(
        "Trimmed {:.2}s-{:.2}s into {}",
        range.start,
        range.end,
        output.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reencode_command() {
        let range = TimeRange::new(5.0, 20.0).unwrap();
        let args = TrimOptions::default()
            .command(Path::new("in.mp4"), Path::new("out.mp4"), range)
            .build_args();

        assert!(args.windows(2).any(|w| w == ["-ss", "5.000"]));
        assert!(args.windows(2).any(|w| w == ["-t", "15.000"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "libx264"]));
        assert!(args.windows(2).any(|w| w == ["-crf", "23"]));
    }

    #[test]
    fn test_stream_copy_command() {
        let options = TrimOptions {
            stream_copy: true,
            ..Default::default()
        };
        let range = TimeRange::new(0.0, 1.0).unwrap();
        let args = options
            .command(Path::new("in.mp4"), Path::new("out.mp4"), range)
            .build_args();

        assert!(args.windows(2).any(|w| w == ["-c", "copy"]));
        assert!(!args.iter().any(|a| a == "libx264"));
    }

    #[tokio::test]
    async fn test_missing_input() {
        let range = TimeRange::new(0.0, 1.0).unwrap();
        let err = trim_clip(
            "/nonexistent/input.mp4",
            "/tmp/out.mp4",
            range,
            &TrimOptions::default(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
