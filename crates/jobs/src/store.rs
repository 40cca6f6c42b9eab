//! Job persistence.
//!
//! Stores save and find whole job records. Status changes go through
//! [`JobStore::update`], which reads, changes and writes one record while
//! holding that record's lock, so a job that reached a terminal state can
//! never be overwritten by a writer that read it earlier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::job::{JobStatus, RenderJob};

/// Change applied under the record lock. Returning `Ok(false)` leaves the
/// record untouched; an error also leaves it untouched.
pub type JobChange = Box<dyn FnOnce(&mut RenderJob) -> ReelResult<bool> + Send>;

/// Outcome of [`JobStore::update`].
#[derive(Debug, Clone, PartialEq)]
pub enum Updated {
    /// The change was written; `previous` is the status it replaced.
    Saved { job: RenderJob, previous: JobStatus },
    /// The change declined to write; the stored record as read.
    Unchanged(RenderJob),
}

impl Updated {
    pub fn job(&self) -> &RenderJob {
        match self {
            Updated::Saved { job, .. } | Updated::Unchanged(job) => job,
        }
    }

    pub fn is_saved(&self) -> bool {
        matches!(self, Updated::Saved { .. })
    }
}

/// Keyed storage for [`RenderJob`] records.
#[async_trait::async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or replace the record for `job.id`.
    async fn save(&self, job: &RenderJob) -> ReelResult<()>;

    /// The record for `id`, or `None` if unknown.
    async fn find(&self, id: &str) -> ReelResult<Option<RenderJob>>;

    /// Atomically apply `change` to the record for `id`.
    ///
    /// Fails with `JobNotFound` when there is no such record.
    async fn update(&self, id: &str, change: JobChange) -> ReelResult<Updated>;
}

/// Run `change` on a copy of `current` so a failed change leaves no trace.
fn apply(current: &RenderJob, change: JobChange) -> ReelResult<Updated> {
    let mut job = current.clone();
    if change(&mut job)? {
        Ok(Updated::Saved {
            job,
            previous: current.status,
        })
    } else {
        Ok(Updated::Unchanged(current.clone()))
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<String, RenderJob>>,
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

#[async_trait::async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, job: &RenderJob) -> ReelResult<()> {
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find(&self, id: &str) -> ReelResult<Option<RenderJob>> {
        Ok(self.jobs.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, change: JobChange) -> ReelResult<Updated> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get_mut(id)
            .ok_or_else(|| ReelError::JobNotFound { id: id.to_string() })?;
        let updated = apply(current, change)?;
        if let Updated::Saved { job, .. } = &updated {
            *current = job.clone();
        }
        Ok(updated)
    }
}

/// One JSON file per job under a directory.
///
/// Writes go to a temporary sibling and are renamed into place, so a reader
/// in another process never sees a half-written record. Record locks are
/// per process and shared between clones.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl FileJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            locks: Arc::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Record path for `id`; `None` for ids that could escape the directory.
    fn record_path(&self, id: &str) -> Option<PathBuf> {
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{id}.json")))
    }

    async fn record_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(locks.entry(id.to_string()).or_default())
    }

    async fn read(&self, path: &Path) -> ReelResult<Option<RenderJob>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &Path, job: &RenderJob) -> ReelResult<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(job)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl JobStore for FileJobStore {
    async fn save(&self, job: &RenderJob) -> ReelResult<()> {
        let path = self
            .record_path(&job.id)
            .ok_or_else(|| ReelError::job(format!("invalid job id {:?}", job.id)))?;
        let lock = self.record_lock(&job.id).await;
        let _guard = lock.lock().await;
        self.write(&path, job).await
    }

    async fn find(&self, id: &str) -> ReelResult<Option<RenderJob>> {
        let Some(path) = self.record_path(id) else {
            return Ok(None);
        };
        self.read(&path).await
    }

    async fn update(&self, id: &str, change: JobChange) -> ReelResult<Updated> {
        let not_found = || ReelError::JobNotFound { id: id.to_string() };
        let path = self.record_path(id).ok_or_else(not_found)?;
        let lock = self.record_lock(id).await;
        let _guard = lock.lock().await;

        let current = self.read(&path).await?.ok_or_else(not_found)?;
        let updated = apply(&current, change)?;
        if let Updated::Saved { job, .. } = &updated {
            self.write(&path, job).await?;
        }
        Ok(updated)
    }
}
