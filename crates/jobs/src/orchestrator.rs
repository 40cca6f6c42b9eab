//! Job creation and lookup.

use std::sync::Arc;

use chrono::Utc;

use storyreel_common::config::JobSettings;
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::job::RenderJob;
use storyreel_model::request::RenderRequest;

use crate::dispatcher::JobDispatcher;
use crate::pipeline::RenderPipeline;
use crate::store::{JobStore, Updated};

/// Upper bound on the configured timeout (ten years).
const MAX_STALE_TIMEOUT_SECS: u64 = 10 * 365 * 24 * 3600;

/// Read access to jobs with the lazy staleness rule applied.
///
/// A job that has sat in `processing` or `rendering` longer than the
/// timeout since its last update is failed and saved on read.
#[derive(Clone)]
pub struct JobQuery {
    store: Arc<dyn JobStore>,
    stale_timeout: chrono::Duration,
}

impl JobQuery {
    pub fn new(store: Arc<dyn JobStore>, stale_timeout: chrono::Duration) -> Self {
        Self {
            store,
            stale_timeout,
        }
    }

    pub fn from_settings(store: Arc<dyn JobStore>, settings: &JobSettings) -> Self {
        let secs = settings.stale_timeout_secs.min(MAX_STALE_TIMEOUT_SECS) as i64;
        Self::new(store, chrono::Duration::seconds(secs))
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Current snapshot of `id`.
    pub async fn get(&self, id: &str) -> ReelResult<RenderJob> {
        let job = self
            .store
            .find(id)
            .await?
            .ok_or_else(|| ReelError::JobNotFound { id: id.to_string() })?;
        if !job.is_stale(Utc::now(), self.stale_timeout) {
            return Ok(job);
        }

        // Re-check under the record lock; the pipeline may have moved on.
        let timeout = self.stale_timeout;
        let updated = self
            .store
            .update(
                id,
                Box::new(move |job: &mut RenderJob| -> ReelResult<bool> {
                    if !job.is_stale(Utc::now(), timeout) {
                        return Ok(false);
                    }
                    let message = format!(
                        "Job timed out: no progress in {} for more than {}s",
                        job.status,
                        timeout.num_seconds()
                    );
                    job.fail(message)
                        .map_err(|e| ReelError::job(e.to_string()))?;
                    Ok(true)
                }),
            )
            .await?;

        match updated {
            Updated::Saved { job, previous } => {
                tracing::warn!(
                    job_id = id,
                    status = %previous,
                    error = job.error.as_deref().unwrap_or_default(),
                    "Stale job marked failed"
                );
                Ok(job)
            }
            Updated::Unchanged(job) => Ok(job),
        }
    }
}

/// Owns the job lifecycle: creates jobs, dispatches their pipelines and
/// answers status reads.
pub struct RenderJobOrchestrator {
    query: JobQuery,
    dispatcher: JobDispatcher,
}

impl RenderJobOrchestrator {
    /// Must be called inside a Tokio runtime; starts the dispatcher.
    pub fn new(pipeline: Arc<RenderPipeline>, settings: &JobSettings) -> Self {
        let query = JobQuery::from_settings(Arc::clone(pipeline.store()), settings);
        let (dispatcher, _supervisor) = JobDispatcher::spawn(pipeline);
        Self { query, dispatcher }
    }

    /// Persist a `queued` job, hand it to the dispatcher and return its id.
    ///
    /// Only an invalid request or a store failure is an error here; every
    /// later problem ends up in the job's status.
    pub async fn create_job(&self, request: RenderRequest) -> ReelResult<String> {
        request
            .validate()
            .map_err(|e| ReelError::validation(e.to_string()))?;

        let job = RenderJob::new(&request.audio_path);
        let id = job.id.clone();
        self.query.store().save(&job).await?;
        tracing::info!(
            job_id = %id,
            sentences = request.sentences.len(),
            audio = %request.audio_path.display(),
            "Render job queued"
        );

        if let Err(e) = self.dispatcher.dispatch(id.clone(), request) {
            let mut job = job;
            if job.fail(e.to_string()).is_ok() {
                self.query.store().save(&job).await?;
            }
            return Err(e);
        }
        Ok(id)
    }

    /// Current snapshot of `id`, with staleness applied.
    pub async fn get_job(&self, id: &str) -> ReelResult<RenderJob> {
        self.query.get(id).await
    }

    pub fn query(&self) -> &JobQuery {
        &self.query
    }
}
