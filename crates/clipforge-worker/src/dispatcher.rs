//! Job submission and lifecycle.
//!
//! Every submitted job runs as its own tokio task. There is no concurrency
//! ceiling; admission control belongs in front of the dispatcher.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Instrument};

use clipforge_media::{CacheStore, Fetcher};
use clipforge_models::{Job, JobId};

use crate::adapters::StageAdapters;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::pipeline::{Orchestrator, StageTimeouts};
use crate::storage::StorageManager;
use crate::store::JobStore;

/// Decrements the running-job count when the task ends, however it ends.
struct RunningGuard(Arc<AtomicUsize>);

impl RunningGuard {
    fn new(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    orchestrator: Arc<Orchestrator>,
    running: Arc<AtomicUsize>,
    shutdown_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        orchestrator: Arc<Orchestrator>,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            store,
            orchestrator,
            running: Arc::new(AtomicUsize::new(0)),
            shutdown_timeout,
        }
    }

    /// Wire up the cache, fetcher, storage and orchestrator from `config`.
    pub async fn from_config(
        config: &WorkerConfig,
        store: Arc<dyn JobStore>,
        adapters: StageAdapters,
    ) -> WorkerResult<Self> {
        let cache = Arc::new(CacheStore::open(&config.cache_dir).await?);
        let fetcher = Arc::new(Fetcher::new(cache, config.fetch_config())?);
        let storage = StorageManager::new(&config.output_dir);
        tokio::fs::create_dir_all(storage.output_dir()).await?;

        let orchestrator = Orchestrator::new(
            store.clone(),
            fetcher,
            adapters,
            storage,
            StageTimeouts::from(config),
        );

        Ok(Self::new(
            store,
            Arc::new(orchestrator),
            config.shutdown_timeout,
        ))
    }

    /// The download cache shared by all jobs.
    pub fn cache(&self) -> &Arc<CacheStore> {
        self.orchestrator.fetcher().cache()
    }

    /// Create a pending job and start its pipeline in the background.
    pub async fn submit(&self, input_ref: &str) -> WorkerResult<JobId> {
        if input_ref.trim().is_empty() {
            return Err(WorkerError::invalid_request("video_path must not be empty"));
        }

        let job = Job::new(input_ref);
        let job_id = job.id.clone();
        self.store.create(job).await?;
        metrics::record_job_submitted();

        let logger = JobLogger::new(&job_id, "clip_generation");
        let span = logger.create_span();
        let guard = RunningGuard::new(self.running.clone());
        let orchestrator = self.orchestrator.clone();
        let task_job_id = job_id.clone();

        tokio::spawn(
            async move {
                let _guard = guard;
                if let Err(e) = orchestrator.run(&task_job_id).await {
                    logger.log_error(&format!("orchestration aborted: {}", e));
                }
            }
            .instrument(span),
        );

        info!(job_id = %job_id, "Job submitted");
        Ok(job_id)
    }

    pub async fn lookup(&self, job_id: &JobId) -> WorkerResult<Job> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| WorkerError::JobNotFound(job_id.to_string()))
    }

    /// Remove a job record and its output files.
    ///
    /// A job still running notices the missing record at its next write and
    /// discards whatever it produced.
    pub async fn delete(&self, job_id: &JobId) -> WorkerResult<()> {
        if !self.store.delete(job_id).await? {
            return Err(WorkerError::JobNotFound(job_id.to_string()));
        }
        self.orchestrator
            .storage()
            .remove_job_artifacts(job_id)
            .await?;
        info!(job_id = %job_id, "Job deleted");
        Ok(())
    }

    pub fn running_jobs(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait for running jobs to finish, up to the shutdown timeout.
    ///
    /// Returns `true` if every job finished in time.
    pub async fn shutdown(&self) -> bool {
        let running = self.running_jobs();
        if running > 0 {
            info!("Waiting for {} running jobs to finish", running);
        }

        let deadline = tokio::time::Instant::now() + self.shutdown_timeout;
        while self.running_jobs() > 0 {
            if tokio::time::Instant::now() >= deadline {
                warn!(
                    "Shutdown timeout reached with {} jobs still running",
                    self.running_jobs()
                );
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }
}
