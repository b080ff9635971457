//! Metric names and recorders for fetch and cache operations.

use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const CACHE_HITS_TOTAL: &str = "clipforge_cache_hits_total";
    pub const CACHE_EVICTIONS_TOTAL: &str = "clipforge_cache_evictions_total";
    pub const DOWNLOADS_TOTAL: &str = "clipforge_downloads_total";
    pub const DOWNLOAD_BYTES_TOTAL: &str = "clipforge_download_bytes_total";
    pub const DOWNLOAD_DURATION_SECONDS: &str = "clipforge_download_duration_seconds";
}

pub fn record_cache_hit() {
    counter!(names::CACHE_HITS_TOTAL).increment(1);
}

pub fn record_evictions(count: usize) {
    counter!(names::CACHE_EVICTIONS_TOTAL).increment(count as u64);
}

/// Record a finished download attempt.
pub fn record_download(outcome: &'static str, bytes: u64, duration_secs: f64) {
    let labels = [("outcome", outcome)];
    counter!(names::DOWNLOADS_TOTAL, &labels).increment(1);
    counter!(names::DOWNLOAD_BYTES_TOTAL).increment(bytes);
    histogram!(names::DOWNLOAD_DURATION_SECONDS, &labels).record(duration_secs);
}
