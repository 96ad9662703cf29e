//! Job records: the contract the orchestrator writes through, and its implementations.

use crate::core::models::{JobUpdate, ScanJob};
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Key/value record of job state. Every operation touches a single job.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Initializes a record as `queued`, progress 0, empty result.
    async fn create(&self, job_id: &str, url: &str) -> Result<(), StoreError>;

    /// Overwrites the fields present in `update`; a result replaces the old one wholesale.
    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError>;

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<String, ScanJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, job_id: &str, url: &str) -> Result<(), StoreError> {
        self.jobs
            .write()
            .await
            .insert(job_id.to_string(), ScanJob::new(job_id, url));
        Ok(())
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        job.apply(update)
    }

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }
}

/// One JSON document per job in a directory, so results outlive the process.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: tokio::sync::Mutex<()>,
}

impl FileJobStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        debug!(dir = %dir.display(), "Opened file job store.");
        Ok(Self {
            dir,
            lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        // Keep ids from escaping the directory.
        let safe: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("scan-{}.json", safe))
    }

    async fn read(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        match tokio::fs::read(self.path_for(job_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, job: &ScanJob) -> Result<(), StoreError> {
        let path = self.path_for(&job.job_id);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(job)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, job_id: &str, url: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        self.write(&ScanJob::new(job_id, url)).await
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let mut job = self
            .read(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;
        job.apply(update)?;
        self.write(&job).await
    }

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        self.read(job_id).await
    }
}

/// Wraps a store so that an unavailable backend never fails the pipeline:
/// write errors are logged and acknowledged, read errors read as "absent".
#[derive(Debug)]
pub struct LenientJobStore<S> {
    inner: S,
}

impl<S: JobStore> LenientJobStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: JobStore> JobStore for LenientJobStore<S> {
    async fn create(&self, job_id: &str, url: &str) -> Result<(), StoreError> {
        if let Err(e) = self.inner.create(job_id, url).await {
            warn!(job_id, error = %e, "Job store create failed; continuing.");
        }
        Ok(())
    }

    async fn update(&self, job_id: &str, update: JobUpdate) -> Result<(), StoreError> {
        if let Err(e) = self.inner.update(job_id, update).await {
            warn!(job_id, error = %e, "Job store update failed; continuing.");
        }
        Ok(())
    }

    async fn get(&self, job_id: &str) -> Result<Option<ScanJob>, StoreError> {
        match self.inner.get(job_id).await {
            Ok(job) => Ok(job),
            Err(e) => {
                warn!(job_id, error = %e, "Job store read failed.");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{JobResult, JobStatus, ResultBundle};

    #[tokio::test]
    async fn test_memory_store_lifecycle() {
        let store = MemoryJobStore::new();
        store.create("job-1", "https://example.com").await.unwrap();

        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Queued);
        assert_eq!(job.progress, 0);
        assert_eq!(job.result, JobResult::Bundle(ResultBundle::default()));

        store
            .update("job-1", JobUpdate::default().status(JobStatus::Running).progress(10))
            .await
            .unwrap();
        let job = store.get("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.progress, 10);
        assert_eq!(job.url, "https://example.com");
    }

    #[tokio::test]
    async fn test_update_of_unknown_job_fails() {
        let store = MemoryJobStore::new();
        let err = store.update("missing", JobUpdate::default().progress(10)).await;
        assert!(matches!(err, Err(StoreError::NotFound(_))));
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lenient_store_acknowledges_failures() {
        let store = LenientJobStore::new(MemoryJobStore::new());
        store
            .update("missing", JobUpdate::default().status(JobStatus::Done))
            .await
            .unwrap();
        assert!(store.get("missing").await.unwrap().is_none());
    }
}
