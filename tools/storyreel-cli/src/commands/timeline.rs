//! Stage a manifest and print the timeline a backend would receive.

use std::path::PathBuf;

use storyreel_alignment::AlignmentEngine;
use storyreel_common::config::AppConfig;
use storyreel_render::staging::{stage_job, write_timeline};

use super::{load_request, voice_over_duration};

pub async fn run(
    config: &AppConfig,
    manifest: PathBuf,
    staging: Option<PathBuf>,
) -> anyhow::Result<()> {
    let request = load_request(&manifest)?;
    let staging = staging.unwrap_or_else(|| config.work_dir.join("preview"));

    let staged = stage_job(&request, config.render.call_to_action.as_ref(), &staging).await?;
    let duration = voice_over_duration(&request, &staged.audio_path()).await?;
    let outcome = AlignmentEngine::from_config(config)
        .align(&staged.audio_path(), &request.sentences, duration)
        .await?;

    let timeline = staged
        .timeline_builder()
        .build(&outcome.timings, &staged.sources, &request.options);
    timeline.validate()?;
    let path = write_timeline(&staging, &timeline).await?;

    eprintln!(
        "{} scenes, {} frames at {} fps ({}x{}), {} tier",
        timeline.scenes.len(),
        timeline.duration_in_frames,
        timeline.fps,
        timeline.width,
        timeline.height,
        outcome.tier
    );
    eprintln!("Written to {}", path.display());
    println!("{}", serde_json::to_string_pretty(&timeline)?);
    Ok(())
}
