//! Job Store contract and the in-memory implementation.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use clipforge_models::{Job, JobId};

use crate::error::{StoreError, StoreResult};

/// Persistence for job records.
///
/// Implementations must give read-after-write consistency for a single job
/// and must refuse to overwrite a record that is already terminal.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: Job) -> StoreResult<()>;

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>>;

    /// Replace the stored record with `job`.
    async fn update(&self, job: &Job) -> StoreResult<()>;

    /// Returns `false` when no record existed.
    async fn delete(&self, id: &JobId) -> StoreResult<bool>;
}

/// Process-local job store.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, Job>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists(job.id));
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn get(&self, id: &JobId) -> StoreResult<Option<Job>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, job: &Job) -> StoreResult<()> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get_mut(&job.id)
            .ok_or_else(|| StoreError::NotFound(job.id.clone()))?;
        if current.is_terminal() {
            return Err(StoreError::Terminal(job.id.clone()));
        }
        *current = job.clone();
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> StoreResult<bool> {
        Ok(self.jobs.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clipforge_models::JobStage;

    #[tokio::test]
    async fn test_create_get_delete() {
        let store = InMemoryJobStore::new();
        let job = Job::new("/tmp/a.mp4");
        let id = job.id.clone();

        store.create(job.clone()).await.unwrap();
        assert!(matches!(
            store.create(job).await,
            Err(StoreError::AlreadyExists(_))
        ));
        assert_eq!(store.get(&id).await.unwrap().unwrap().input_ref, "/tmp/a.mp4");

        assert!(store.delete(&id).await.unwrap());
        assert!(!store.delete(&id).await.unwrap());
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_missing_job() {
        let store = InMemoryJobStore::new();
        let job = Job::new("/tmp/a.mp4");
        assert!(matches!(store.update(&job).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_terminal_record_is_frozen() {
        let store = InMemoryJobStore::new();
        let mut job = Job::new("/tmp/a.mp4");
        store.create(job.clone()).await.unwrap();

        job.complete(Vec::new()).unwrap();
        store.update(&job).await.unwrap();

        let mut stale = job.clone();
        stale.stage = JobStage::Failed;
        stale.error_message = Some("late".into());
        assert!(matches!(store.update(&stale).await, Err(StoreError::Terminal(_))));

        let stored = store.get(&job.id).await.unwrap().unwrap();
        assert_eq!(stored.stage, JobStage::Completed);
        assert!(stored.error_message.is_none());
    }
}
