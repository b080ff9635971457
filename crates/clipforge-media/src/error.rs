//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while fetching, caching or trimming media.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    #[error("Download timed out after {0} seconds")]
    DownloadTimeout(u64),

    #[error("File too large: {size} bytes exceeds the size limit of {limit} bytes")]
    DownloadTooLarge { size: u64, limit: u64 },

    #[error("Download failed: {0}")]
    DownloadTransport(String),

    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an invalid reference error.
    pub fn invalid_reference(message: impl Into<String>) -> Self {
        Self::InvalidReference(message.into())
    }

    /// Create a transport failure error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::DownloadTransport(message.into())
    }

    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }
}

impl From<reqwest::Error> for MediaError {
    fn from(e: reqwest::Error) -> Self {
        match e.status() {
            Some(status) => Self::DownloadTransport(format!("server responded with {}", status)),
            None => Self::DownloadTransport(e.to_string()),
        }
    }
}
