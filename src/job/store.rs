use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::{Job, JobStore, JobUpdate};
use crate::error::{Result, VideoError};

/// Job records kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, Job>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create(&self, total_scenes: usize) -> Result<Job> {
        let job = Job::new(total_scenes);
        self.jobs.write().await.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        Ok(self.jobs.read().await.get(&id).cloned())
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(&id)
            .ok_or_else(|| VideoError::JobError(format!("Unknown job: {}", id)))?;
        job.apply(update)?;
        Ok(job.clone())
    }
}

/// One JSON file per job, so other processes can poll progress.
#[derive(Debug)]
pub struct FileJobStore {
    dir: PathBuf,
    // serialises read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileJobStore {
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    async fn read(&self, id: Uuid) -> Result<Option<Job>> {
        let path = self.path_for(id);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a temp file and rename so readers never see a partial record.
    async fn write(&self, job: &Job) -> Result<()> {
        let path = self.path_for(job.id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!("Wrote job record {}", path.display());
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn create(&self, total_scenes: usize) -> Result<Job> {
        let _guard = self.lock.lock().await;
        let job = Job::new(total_scenes);
        self.write(&job).await?;
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Job>> {
        self.read(id).await
    }

    async fn update(&self, id: Uuid, update: JobUpdate) -> Result<Job> {
        let _guard = self.lock.lock().await;
        let mut job = self
            .read(id)
            .await?
            .ok_or_else(|| VideoError::JobError(format!("Unknown job: {}", id)))?;
        job.apply(update)?;
        self.write(&job).await?;
        Ok(job)
    }
}
