//! Media handling for ClipForge.
//!
//! This crate provides:
//! - Input resolution for local paths and remote URLs
//! - A download cache with per-key serialization and age-based eviction
//! - FFmpeg command building and clip trimming

pub mod cache;
pub mod command;
pub mod error;
pub mod fetch;
pub mod fs_utils;
pub mod metrics;
pub mod trim;

pub use cache::{cache_key, CacheEntry, CacheStore};
pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use fetch::{FetchConfig, Fetcher, ResolvedMedia, ResolvedOrigin};
pub use trim::{trim_clip, TrimOptions};
