//! Render backend abstraction and progress reporting.

use std::path::Path;
use std::sync::Arc;

use storyreel_common::config::{RenderBackendKind, RenderSettings};
use storyreel_common::error::ReelResult;
use storyreel_model::timeline::Timeline;

use crate::command::CommandRenderBackend;
use crate::ffmpeg::FfmpegSlideshowBackend;

/// Progress callback for rendering.
pub type ProgressCallback = Box<dyn Fn(RenderProgress) + Send + Sync>;

/// Render progress report.
#[derive(Debug, Clone)]
pub struct RenderProgress {
    /// Current progress [0.0, 1.0].
    pub progress: f64,

    /// Frames rendered so far.
    pub frames_rendered: u64,

    /// Total frames to render.
    pub total_frames: u64,

    /// Estimated time remaining in seconds.
    pub eta_secs: f64,

    /// Current stage.
    pub stage: RenderStage,
}

impl RenderProgress {
    pub fn at_stage(stage: RenderStage, total_frames: u64) -> Self {
        let done = stage == RenderStage::Complete;
        Self {
            progress: if done { 1.0 } else { 0.0 },
            frames_rendered: if done { total_frames } else { 0 },
            total_frames,
            eta_secs: 0.0,
            stage,
        }
    }
}

/// Stages of a render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Preparing,
    Rendering,
    Finalizing,
    Complete,
}

/// Produces a video file from a timeline and a staging directory.
#[async_trait::async_trait]
pub trait RenderBackend: Send + Sync {
    /// Render `timeline` to `output_path`. Timeline sources resolve against
    /// `staging_dir`.
    async fn render(
        &self,
        timeline: &Timeline,
        staging_dir: &Path,
        output_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> ReelResult<()>;

    /// Check if this backend is available on the system.
    fn is_available(&self) -> bool;

    /// Backend name.
    fn name(&self) -> &str;
}

/// Backend selected by configuration.
pub fn backend_from_config(settings: &RenderSettings) -> Arc<dyn RenderBackend> {
    match settings.backend {
        RenderBackendKind::Ffmpeg => Arc::new(FfmpegSlideshowBackend::new(settings)),
        RenderBackendKind::Command => Arc::new(CommandRenderBackend::new(
            settings.command_program.clone(),
            settings.command_args.clone(),
        )),
    }
}
