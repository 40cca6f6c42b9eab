//! Job-private staging directories.
//!
//! Every job renders from its own copy of the voice-over and visuals so
//! concurrent jobs never share files. Timeline sources are paths relative
//! to the staging directory.
//!
//! ```text
//! <work_dir>/<job id>/
//!   audio.<ext>
//!   assets/scene-000.<ext>
//!   assets/cta.<ext>
//!   timeline.json
//!   captions.srt
//! ```

use std::path::{Path, PathBuf};

use storyreel_common::config::CallToActionConfig;
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::request::RenderRequest;
use storyreel_model::timeline::Timeline;

use crate::timeline_builder::{SceneSource, TimelineBuilder};

pub const ASSETS_DIR: &str = "assets";
pub const TIMELINE_FILE: &str = "timeline.json";
pub const CAPTIONS_FILE: &str = "captions.srt";

/// Inputs copied into a staging directory.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedJob {
    pub dir: PathBuf,
    pub audio_src: String,
    /// One entry per sentence.
    pub sources: Vec<SceneSource>,
    /// Staged call-to-action clip and the sentence text it replaces.
    pub call_to_action: Option<(String, String)>,
}

impl StagedJob {
    pub fn audio_path(&self) -> PathBuf {
        self.dir.join(&self.audio_src)
    }

    /// A [`TimelineBuilder`] wired to this job's staged files.
    pub fn timeline_builder(&self) -> TimelineBuilder {
        let builder = TimelineBuilder::new(self.audio_src.clone());
        match &self.call_to_action {
            Some((text, src)) => builder.with_call_to_action(text.clone(), src.clone()),
            None => builder,
        }
    }
}

fn staged_name(stem: &str, source: &Path) -> String {
    match source.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    }
}

async fn copy_into(source: &Path, dir: &Path, relative: &str) -> ReelResult<String> {
    if !tokio::fs::try_exists(source).await.unwrap_or(false) {
        return Err(ReelError::FileNotFound {
            path: source.to_path_buf(),
        });
    }
    let target = dir.join(relative);
    tokio::fs::copy(source, &target).await.map_err(|e| {
        ReelError::staging(format!(
            "failed to copy {} to {}: {e}",
            source.display(),
            target.display()
        ))
    })?;
    Ok(relative.to_string())
}

/// Copy the request's audio and assets into `dir`.
///
/// `dir` is created if needed. Any missing input fails staging.
pub async fn stage_job(
    request: &RenderRequest,
    call_to_action: Option<&CallToActionConfig>,
    dir: &Path,
) -> ReelResult<StagedJob> {
    tokio::fs::create_dir_all(dir.join(ASSETS_DIR)).await.map_err(|e| {
        ReelError::staging(format!("failed to create {}: {e}", dir.display()))
    })?;

    let audio_src = copy_into(
        &request.audio_path,
        dir,
        &staged_name("audio", &request.audio_path),
    )
    .await?;

    let mut sources = Vec::with_capacity(request.sentences.len());
    for index in 0..request.sentences.len() {
        let asset = request.asset(index);
        let stem = format!("{ASSETS_DIR}/scene-{index:03}");
        let source = match (&asset.image_path, &asset.video_path) {
            (Some(image), _) => {
                SceneSource::image(copy_into(image, dir, &staged_name(&stem, image)).await?)
            }
            (None, Some(video)) => {
                SceneSource::video(copy_into(video, dir, &staged_name(&stem, video)).await?)
            }
            (None, None) => SceneSource::default(),
        };
        sources.push(source);
    }

    let call_to_action = match call_to_action {
        Some(cta) => {
            let name = staged_name(&format!("{ASSETS_DIR}/cta"), &cta.video_path);
            let src = copy_into(&cta.video_path, dir, &name).await?;
            Some((cta.text.clone(), src))
        }
        None => None,
    };

    tracing::debug!(
        dir = %dir.display(),
        assets = sources.iter().filter(|s| *s != &SceneSource::default()).count(),
        "Job inputs staged"
    );

    Ok(StagedJob {
        dir: dir.to_path_buf(),
        audio_src,
        sources,
        call_to_action,
    })
}

/// Write `timeline.json` into the staging directory.
pub async fn write_timeline(dir: &Path, timeline: &Timeline) -> ReelResult<PathBuf> {
    let path = dir.join(TIMELINE_FILE);
    let json = serde_json::to_string_pretty(timeline)?;
    tokio::fs::write(&path, json).await?;
    Ok(path)
}

/// Delete a staging directory, ignoring one that is already gone.
pub async fn remove_staging(dir: &Path) -> ReelResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
