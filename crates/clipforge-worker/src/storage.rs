//! Output layout for generated clips.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use clipforge_media::fs_utils::remove_if_exists;
use clipforge_models::JobId;

use crate::error::WorkerResult;

/// Owns the clip output directory.
///
/// Clips for a job live in `<output_dir>/<job_id>/clip_<job_id>_<NNN>.mp4`,
/// numbered from 1.
#[derive(Debug, Clone)]
pub struct StorageManager {
    output_dir: PathBuf,
}

impl StorageManager {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.output_dir.join(job_id.as_str())
    }

    /// Filename and full path for the `index`-th clip (1-based) of a job.
    pub fn clip_output_path(&self, job_id: &JobId, index: usize) -> (String, PathBuf) {
        let filename = format!("clip_{}_{:03}.mp4", job_id, index);
        let path = self.job_dir(job_id).join(&filename);
        (filename, path)
    }

    pub async fn prepare_job_dir(&self, job_id: &JobId) -> WorkerResult<PathBuf> {
        let dir = self.job_dir(job_id);
        fs::create_dir_all(&dir).await?;
        Ok(dir)
    }

    /// Delete everything produced for a job. Returns `false` if there was nothing.
    pub async fn remove_job_artifacts(&self, job_id: &JobId) -> WorkerResult<bool> {
        let dir = self.job_dir(job_id);
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(job_id = %job_id, "Removed job artifacts at {}", dir.display());
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove individual clip files of a job that will not be published.
    ///
    /// The job directory is removed too if that leaves it empty.
    pub async fn discard(&self, job_id: &JobId, files: &[PathBuf]) -> usize {
        let mut removed = 0;
        for file in files {
            if remove_if_exists(file).await {
                removed += 1;
            }
        }
        // Fails harmlessly when the directory is missing or still has files.
        if fs::remove_dir(self.job_dir(job_id)).await.is_ok() {
            debug!(job_id = %job_id, "Removed empty job directory");
        }
        removed
    }
}
