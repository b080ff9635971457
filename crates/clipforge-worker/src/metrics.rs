//! Job metrics.

use metrics::{counter, histogram};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "clipforge_jobs_submitted_total";
    pub const JOBS_FINISHED_TOTAL: &str = "clipforge_jobs_finished_total";
    pub const STAGE_DURATION_SECONDS: &str = "clipforge_stage_duration_seconds";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

/// `outcome` is "completed" or "failed".
pub fn record_job_finished(outcome: &'static str) {
    counter!(names::JOBS_FINISHED_TOTAL, "outcome" => outcome).increment(1);
}

pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}
