//! The work done for one render job after it is created.
//!
//! Stages: stage inputs, resolve the voice-over duration, align, build the
//! timeline, render. Every status change is an atomic store update that
//! declines to write once the job is terminal (a read marked it stale), and
//! the pipeline then stops without touching it again.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use storyreel_alignment::AlignmentEngine;
use storyreel_audio::probe::{DurationProbe, FfprobeDurationProbe};
use storyreel_audio::subtitles::save_captions;
use storyreel_common::config::{AppConfig, CallToActionConfig};
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::job::{JobStatus, RenderJob, TransitionError};
use storyreel_model::request::RenderRequest;
use storyreel_render::backend::{backend_from_config, ProgressCallback, RenderBackend, RenderProgress};
use storyreel_render::staging::{remove_staging, stage_job, write_timeline, CAPTIONS_FILE};

use crate::store::{JobStore, Updated};

/// Collaborators and paths shared by every job.
pub struct RenderPipeline {
    store: Arc<dyn JobStore>,
    engine: Arc<AlignmentEngine>,
    backend: Arc<dyn RenderBackend>,
    probe: Arc<dyn DurationProbe>,
    work_dir: PathBuf,
    output_dir: PathBuf,
    call_to_action: Option<CallToActionConfig>,
    keep_staging: bool,
}

impl RenderPipeline {
    pub fn new(
        store: Arc<dyn JobStore>,
        engine: Arc<AlignmentEngine>,
        backend: Arc<dyn RenderBackend>,
    ) -> Self {
        let defaults = AppConfig::default();
        Self {
            store,
            engine,
            backend,
            probe: Arc::new(FfprobeDurationProbe),
            work_dir: defaults.work_dir,
            output_dir: defaults.output_dir,
            call_to_action: None,
            keep_staging: false,
        }
    }

    /// Pipeline with the collaborators named by `config`.
    pub fn from_config(config: &AppConfig, store: Arc<dyn JobStore>) -> Self {
        let engine = Arc::new(AlignmentEngine::from_config(config));
        let mut pipeline = Self::new(store, engine, backend_from_config(&config.render))
            .with_paths(&config.work_dir, &config.output_dir)
            .with_keep_staging(config.jobs.keep_staging);
        if let Some(cta) = &config.render.call_to_action {
            pipeline = pipeline.with_call_to_action(cta.clone());
        }
        pipeline
    }

    pub fn with_probe(mut self, probe: Arc<dyn DurationProbe>) -> Self {
        self.probe = probe;
        self
    }

    /// Staging root and default output directory.
    pub fn with_paths(mut self, work_dir: &Path, output_dir: &Path) -> Self {
        self.work_dir = work_dir.to_path_buf();
        self.output_dir = output_dir.to_path_buf();
        self
    }

    pub fn with_call_to_action(mut self, cta: CallToActionConfig) -> Self {
        self.call_to_action = Some(cta);
        self
    }

    pub fn with_keep_staging(mut self, keep: bool) -> Self {
        self.keep_staging = keep;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn backend(&self) -> &Arc<dyn RenderBackend> {
        &self.backend
    }

    pub fn staging_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }

    /// Run every stage for `job_id`, recording any failure on the job.
    pub async fn run(&self, job_id: &str, request: &RenderRequest) {
        let started = std::time::Instant::now();
        match self.execute(job_id, request).await {
            Ok(Some(video_path)) => {
                tracing::info!(
                    job_id,
                    video = %video_path.display(),
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Render job completed"
                );
            }
            Ok(None) => {
                tracing::info!(job_id, "Render job already terminal; pipeline stopped");
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "Render job failed");
                self.mark_failed(job_id, e.to_string()).await;
            }
        }

        if !self.keep_staging {
            if let Err(e) = remove_staging(&self.staging_dir(job_id)).await {
                tracing::warn!(job_id, error = %e, "Failed to remove staging directory");
            }
        }
    }

    /// Record `message` on the job unless it is already terminal.
    pub async fn mark_failed(&self, job_id: &str, message: impl Into<String>) {
        let message = message.into();
        let failure = message.clone();
        let result = self.advance(job_id, move |job| job.fail(failure)).await;
        match result {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::debug!(job_id, %message, "Job already terminal; failure not recorded");
            }
            Err(e) => {
                tracing::error!(job_id, error = %e, %message, "Could not record job failure");
            }
        }
    }

    /// Apply `change` to the stored job under the store's record lock.
    ///
    /// Returns `None` without saving when the job is already terminal.
    async fn advance(
        &self,
        job_id: &str,
        change: impl FnOnce(&mut RenderJob) -> Result<(), TransitionError> + Send + 'static,
    ) -> ReelResult<Option<RenderJob>> {
        let updated = self
            .store
            .update(
                job_id,
                Box::new(move |job: &mut RenderJob| -> ReelResult<bool> {
                    if job.status.is_terminal() {
                        return Ok(false);
                    }
                    change(job).map_err(|e| ReelError::job(e.to_string()))?;
                    Ok(true)
                }),
            )
            .await?;

        match updated {
            Updated::Saved { job, previous } => {
                tracing::info!(job_id, from = %previous, to = %job.status, "Job status changed");
                Ok(Some(job))
            }
            Updated::Unchanged(_) => Ok(None),
        }
    }

    /// `Ok(None)` means the job went terminal underneath the pipeline.
    async fn execute(&self, job_id: &str, request: &RenderRequest) -> ReelResult<Option<PathBuf>> {
        if self
            .advance(job_id, |job| job.transition(JobStatus::Processing))
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let staging_dir = self.staging_dir(job_id);
        let staged = stage_job(request, self.call_to_action.as_ref(), &staging_dir).await?;
        let audio_path = staged.audio_path();

        let duration_secs = match request.duration_secs {
            Some(secs) => secs,
            None => self.probe.duration_secs(&audio_path).await?,
        };

        let outcome = self
            .engine
            .align(&audio_path, &request.sentences, duration_secs)
            .await?;
        let timeline = staged.timeline_builder().build(
            &outcome.timings,
            &staged.sources,
            &request.options,
        );
        timeline
            .validate()
            .map_err(|e| ReelError::job(format!("built an invalid timeline: {e}")))?;

        write_timeline(&staging_dir, &timeline).await?;
        save_captions(&outcome.timings, &staging_dir.join(CAPTIONS_FILE)).await?;

        let tier = outcome.tier;
        let recorded = timeline.clone();
        if self
            .advance(job_id, move |job| {
                job.timeline = Some(recorded);
                job.alignment_tier = Some(tier);
                job.transition(JobStatus::Rendering)
            })
            .await?
            .is_none()
        {
            return Ok(None);
        }

        let output_path = request
            .output_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join(format!("{job_id}.mp4")));
        let progress_id = job_id.to_string();
        let progress: ProgressCallback = Box::new(move |p: RenderProgress| {
            tracing::debug!(
                job_id = %progress_id,
                progress = p.progress,
                frames = p.frames_rendered,
                total_frames = p.total_frames,
                eta_secs = p.eta_secs,
                stage = ?p.stage,
                "Render progress"
            );
        });

        tracing::info!(
            job_id,
            backend = self.backend.name(),
            tier = %tier,
            frames = timeline.duration_in_frames,
            "Rendering"
        );
        self.backend
            .render(&timeline, &staging_dir, &output_path, Some(progress))
            .await?;

        let video_path = output_path.clone();
        Ok(self
            .advance(job_id, move |job| job.complete(video_path))
            .await?
            .map(|_| output_path))
    }
}
