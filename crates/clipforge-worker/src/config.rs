//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use clipforge_media::FetchConfig;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Download cache directory
    pub cache_dir: PathBuf,
    /// Root of per-job clip output directories
    pub output_dir: PathBuf,
    /// Largest accepted remote download, in bytes
    pub max_download_bytes: u64,
    /// Wall-clock limit for one download
    pub download_timeout: Duration,
    /// Age after which cached downloads are evicted
    pub cache_max_age: Duration,
    /// How often the cache sweeper runs
    pub cache_sweep_interval: Duration,
    pub transcribe_timeout: Duration,
    pub detect_timeout: Duration,
    /// Timeout for each individual trim
    pub trim_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./temp_uploads"),
            output_dir: PathBuf::from("./clips_output"),
            max_download_bytes: 2 * 1024 * 1024 * 1024,
            download_timeout: Duration::from_secs(300),
            cache_max_age: Duration::from_secs(24 * 3600),
            cache_sweep_interval: Duration::from_secs(3600),
            transcribe_timeout: Duration::from_secs(3600),
            detect_timeout: Duration::from_secs(600),
            trim_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn env_secs(name: &str) -> Option<Duration> {
    env_parse::<u64>(name).map(Duration::from_secs)
}

fn hours(h: u64) -> Duration {
    Duration::from_secs(h.saturating_mul(3600))
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: std::env::var("TEMP_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.cache_dir),
            output_dir: std::env::var("CLIPS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_download_bytes: env_parse("MAX_DOWNLOAD_BYTES")
                .unwrap_or(defaults.max_download_bytes),
            download_timeout: env_secs("DOWNLOAD_TIMEOUT_SECS")
                .unwrap_or(defaults.download_timeout),
            cache_max_age: env_parse::<u64>("CACHE_MAX_AGE_HOURS")
                .map(hours)
                .unwrap_or(defaults.cache_max_age),
            cache_sweep_interval: env_secs("CACHE_SWEEP_INTERVAL_SECS")
                .filter(|d| !d.is_zero())
                .unwrap_or(defaults.cache_sweep_interval),
            transcribe_timeout: env_secs("TRANSCRIBE_TIMEOUT_SECS")
                .unwrap_or(defaults.transcribe_timeout),
            detect_timeout: env_secs("DETECT_TIMEOUT_SECS").unwrap_or(defaults.detect_timeout),
            trim_timeout: env_secs("TRIM_TIMEOUT_SECS").unwrap_or(defaults.trim_timeout),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT")
                .unwrap_or(defaults.shutdown_timeout),
        }
    }

    /// Limits handed to the fetcher.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_download_bytes: self.max_download_bytes,
            download_timeout: self.download_timeout,
            cache_max_age: self.cache_max_age,
        }
    }
}
