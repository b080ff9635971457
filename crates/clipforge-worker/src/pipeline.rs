//! Per-job pipeline: Fetch, Transcribe, Detect, Trim, Finalize.
//!
//! The orchestrator is the only writer of a job record while the job runs.
//! Each transition is written to the store before the next stage starts,
//! and every stage is attempted exactly once.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clipforge_media::fetch::is_remote_reference;
use clipforge_media::Fetcher;
use clipforge_models::{Clip, Job, JobId, JobStage, TimeRange, TransitionError};

use crate::adapters::StageAdapters;
use crate::config::WorkerConfig;
use crate::error::{PipelineError, Stage, StoreError, WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::storage::StorageManager;
use crate::store::JobStore;

/// Upper bounds for each adapter call.
#[derive(Debug, Clone, Copy)]
pub struct StageTimeouts {
    pub transcribe: Duration,
    pub detect: Duration,
    /// Applied to each clip separately
    pub trim: Duration,
}

impl From<&WorkerConfig> for StageTimeouts {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            transcribe: config.transcribe_timeout,
            detect: config.detect_timeout,
            trim: config.trim_timeout,
        }
    }
}

/// Why a run stopped before finalizing.
enum Halt {
    /// The job fails with this reason.
    Failed(PipelineError),
    /// The record could not be written; the job cannot be finalized.
    Store(StoreError),
    Transition(TransitionError),
}

impl From<PipelineError> for Halt {
    fn from(e: PipelineError) -> Self {
        Halt::Failed(e)
    }
}

impl From<StoreError> for Halt {
    fn from(e: StoreError) -> Self {
        Halt::Store(e)
    }
}

impl From<TransitionError> for Halt {
    fn from(e: TransitionError) -> Self {
        Halt::Transition(e)
    }
}

fn describe(limit: Duration) -> String {
    if limit.subsec_nanos() == 0 {
        format!("timed out after {} seconds", limit.as_secs())
    } else {
        format!("timed out after {} ms", limit.as_millis())
    }
}

/// Run one adapter call under a timeout, attributing failures to `stage`.
async fn within<T, F>(stage: Stage, limit: Duration, call: F) -> Result<T, PipelineError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let started = Instant::now();
    let result = tokio::time::timeout(limit, call).await;
    metrics::record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());

    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(PipelineError::stage_failure(stage, format!("{:#}", e))),
        Err(_) => Err(PipelineError::stage_failure(stage, describe(limit))),
    }
}

/// Drives jobs through the pipeline.
pub struct Orchestrator {
    store: Arc<dyn JobStore>,
    fetcher: Arc<Fetcher>,
    adapters: StageAdapters,
    storage: StorageManager,
    timeouts: StageTimeouts,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn JobStore>,
        fetcher: Arc<Fetcher>,
        adapters: StageAdapters,
        storage: StorageManager,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            store,
            fetcher,
            adapters,
            storage,
            timeouts,
        }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    pub fn fetcher(&self) -> &Arc<Fetcher> {
        &self.fetcher
    }

    /// Run the pipeline for a pending job to a terminal state.
    ///
    /// Returns an error only when the job record itself could not be read
    /// or written. Stage failures end the job as `Failed` and return `Ok`.
    pub async fn run(&self, job_id: &JobId) -> WorkerResult<()> {
        let Some(mut job) = self.store.get(job_id).await? else {
            tracing::warn!(job_id = %job_id, "Job record missing, nothing to run");
            return Ok(());
        };
        if job.stage != JobStage::Pending {
            tracing::warn!(job_id = %job_id, stage = %job.stage, "Job already started, skipping");
            return Ok(());
        }

        let logger = JobLogger::new(job_id, "clip_generation");
        logger.log_start(&job.input_ref);

        let mut produced = Vec::new();
        match self.drive(&mut job, &mut produced, &logger).await {
            Ok(clips) => {
                let count = clips.len();
                job.complete(clips)?;
                if let Err(e) = self.store.update(&job).await {
                    self.abandon(job_id, &produced, &logger).await;
                    return Err(e.into());
                }
                metrics::record_job_finished("completed");
                logger.log_completion(&format!("{} clips generated", count));
                Ok(())
            }
            Err(Halt::Failed(reason)) => {
                self.storage.discard(job_id, &produced).await;
                logger.log_error(&reason.to_string());
                job.fail(reason.to_string())?;
                metrics::record_job_finished("failed");
                self.store.update(&job).await?;
                Ok(())
            }
            Err(Halt::Store(e)) => {
                self.abandon(job_id, &produced, &logger).await;
                Err(e.into())
            }
            Err(Halt::Transition(e)) => {
                self.abandon(job_id, &produced, &logger).await;
                Err(WorkerError::Transition(e))
            }
        }
    }

    /// Clean up after a run whose record can no longer be written,
    /// typically because the job was deleted while running.
    async fn abandon(&self, job_id: &JobId, produced: &[PathBuf], logger: &JobLogger) {
        logger.log_warning("job record unavailable, discarding output");
        self.storage.discard(job_id, produced).await;
        if let Ok(None) = self.store.get(job_id).await {
            if let Err(e) = self.storage.remove_job_artifacts(job_id).await {
                logger.log_warning(&format!("failed to remove job artifacts: {}", e));
            }
        }
    }

    async fn advance(&self, job: &mut Job, stage: JobStage, message: String) -> Result<(), Halt> {
        job.advance(stage, message)?;
        self.store.update(job).await?;
        Ok(())
    }

    async fn drive(
        &self,
        job: &mut Job,
        produced: &mut Vec<PathBuf>,
        logger: &JobLogger,
    ) -> Result<Vec<Clip>, Halt> {
        // Fetch. Local inputs never enter Downloading.
        if is_remote_reference(&job.input_ref) {
            self.advance(job, JobStage::Downloading, "downloading remote media".into())
                .await?;
        }
        let started = Instant::now();
        let resolved = self.fetcher.resolve(&job.input_ref).await;
        metrics::record_stage_duration(Stage::Download.as_str(), started.elapsed().as_secs_f64());
        let resolved = resolved.map_err(PipelineError::from)?;
        logger.log_progress(&format!(
            "media resolved ({:?}) at {}",
            resolved.origin,
            resolved.path.display()
        ));
        let media = resolved.path;

        job.set_resolved_media(media.to_string_lossy())?;
        self.advance(job, JobStage::Transcribing, "transcribing audio".into())
            .await?;

        let transcript = within(
            Stage::Transcribe,
            self.timeouts.transcribe,
            self.adapters.transcriber.transcribe(&media),
        )
        .await?;
        logger.log_progress(&format!("transcribed {} segments", transcript.segments.len()));

        self.advance(job, JobStage::Detecting, "detecting clip boundaries".into())
            .await?;
        let ranges = within(
            Stage::Detect,
            self.timeouts.detect,
            self.adapters.detector.detect_clips(&transcript),
        )
        .await?;
        for range in &ranges {
            range.validate().map_err(|e| {
                PipelineError::stage_failure(Stage::Detect, format!("invalid clip range: {}", e))
            })?;
        }

        if ranges.is_empty() {
            logger.log_progress("no clip-worthy segments detected");
            return Ok(Vec::new());
        }

        self.advance(
            job,
            JobStage::Trimming,
            format!("trimming {} clips", ranges.len()),
        )
        .await?;
        self.trim_all(&job.id, &media, &ranges, produced).await
    }

    async fn trim_all(
        &self,
        job_id: &JobId,
        media: &Path,
        ranges: &[TimeRange],
        produced: &mut Vec<PathBuf>,
    ) -> Result<Vec<Clip>, Halt> {
        self.storage
            .prepare_job_dir(job_id)
            .await
            .map_err(|e| PipelineError::stage_failure(Stage::Trim, e.to_string()))?;

        let mut clips = Vec::with_capacity(ranges.len());
        for (index, range) in ranges.iter().enumerate() {
            let (filename, path) = self.storage.clip_output_path(job_id, index + 1);
            produced.push(path.clone());

            within(
                Stage::Trim,
                self.timeouts.trim,
                self.adapters.trimmer.trim(media, *range, &path),
            )
            .await
            .map_err(|e| match e {
                PipelineError::StageFailure { stage, cause } => PipelineError::StageFailure {
                    stage,
                    cause: format!("clip {} of {}: {}", index + 1, ranges.len(), cause),
                },
                other => other,
            })?;

            clips.push(Clip::new(filename, path.to_string_lossy(), *range));
        }
        Ok(clips)
    }
}
