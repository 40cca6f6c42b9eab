//! Slideshow rendering with ffmpeg.
//!
//! Each scene slot becomes one ffmpeg input (a looped still, a looped clip,
//! or a black card for text-only scenes). Every input is normalized to the
//! timeline resolution and frame rate, trimmed to its slot, and the slots
//! are concatenated over the staged voice-over.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};

use storyreel_audio::probe::command_exists;
use storyreel_common::config::RenderSettings;
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::timeline::{Scene, SceneSlot, Timeline};

use crate::backend::{ProgressCallback, RenderBackend, RenderProgress, RenderStage};

/// Length of the noise burst on a glitch scene.
const GLITCH_SECS: f64 = 0.4;

/// Arguments and bookkeeping for one ffmpeg run.
#[derive(Debug, Clone)]
pub struct RenderPlan {
    pub ffmpeg_args: Vec<String>,
    pub total_frames: u64,
    pub expected_duration_secs: f64,
}

/// Renders timelines as a scaled and padded slideshow.
#[derive(Debug, Clone)]
pub struct FfmpegSlideshowBackend {
    video_bitrate_kbps: u32,
    audio_bitrate_kbps: u32,
}

impl FfmpegSlideshowBackend {
    pub fn new(settings: &RenderSettings) -> Self {
        Self {
            video_bitrate_kbps: settings.video_bitrate_kbps,
            audio_bitrate_kbps: settings.audio_bitrate_kbps,
        }
    }

    /// Build the ffmpeg invocation for `timeline`.
    ///
    /// Fails if the timeline is malformed or a staged source is missing.
    pub fn build_plan(
        &self,
        timeline: &Timeline,
        staging_dir: &Path,
        output_path: &Path,
    ) -> ReelResult<RenderPlan> {
        timeline
            .validate()
            .map_err(|e| ReelError::render(format!("invalid timeline: {e}")))?;

        let audio = staging_dir.join(&timeline.audio_src);
        if !audio.exists() {
            return Err(ReelError::FileNotFound { path: audio });
        }

        let fps = timeline.fps;
        let slots = timeline.scene_slots();
        let mut args: Vec<String> = [
            "-y",
            "-hide_banner",
            "-loglevel",
            "error",
            "-nostats",
            "-progress",
            "pipe:1",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut chains = Vec::with_capacity(slots.len());
        for (input, slot) in slots.iter().enumerate() {
            let scene = timeline
                .scenes
                .iter()
                .find(|s| s.index == slot.index)
                .ok_or_else(|| ReelError::render(format!("no scene for slot {}", slot.index)))?;
            args.extend(scene_input_args(scene, slot, timeline, staging_dir)?);
            chains.push(scene_filter(input, scene, slot, timeline));
        }

        let labels: String = (0..slots.len()).map(|i| format!("[v{i}]")).collect();
        let filter = format!(
            "{};{labels}concat=n={}:v=1:a=0[vout]",
            chains.join(";"),
            slots.len()
        );

        let expected_duration_secs = timeline.duration_secs();
        args.push("-i".to_string());
        args.push(audio.display().to_string());
        args.push("-filter_complex".to_string());
        args.push(filter);
        args.push("-map".to_string());
        args.push("[vout]".to_string());
        args.push("-map".to_string());
        args.push(format!("{}:a:0", slots.len()));
        args.push("-r".to_string());
        args.push(fps.to_string());
        args.push("-frames:v".to_string());
        args.push(timeline.duration_in_frames.to_string());
        args.push("-t".to_string());
        args.push(format!("{expected_duration_secs:.6}"));
        args.extend(self.codec_args());
        args.push(output_path.display().to_string());

        Ok(RenderPlan {
            ffmpeg_args: args,
            total_frames: timeline.duration_in_frames,
            expected_duration_secs,
        })
    }

    fn codec_args(&self) -> Vec<String> {
        let video_bitrate = format!("{}k", self.video_bitrate_kbps.max(1000));
        let audio_bitrate = format!("{}k", self.audio_bitrate_kbps.max(64));
        vec![
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "medium".to_string(),
            "-profile:v".to_string(),
            "high".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-b:v".to_string(),
            video_bitrate,
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            audio_bitrate,
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]
    }

    async fn run_ffmpeg(&self, plan: &RenderPlan, progress: Option<ProgressCallback>) -> ReelResult<()> {
        tracing::debug!(args = ?plan.ffmpeg_args, "Running ffmpeg");
        let start = std::time::Instant::now();
        let mut child = tokio::process::Command::new("ffmpeg")
            .args(&plan.ffmpeg_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReelError::render(format!("Failed to start ffmpeg: {e}")))?;

        tracing::info!(
            pid = child.id(),
            args_len = plan.ffmpeg_args.len(),
            total_frames = plan.total_frames,
            "ffmpeg process started"
        );

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ReelError::render("Failed to capture ffmpeg stdout"))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| ReelError::render("Failed to capture ffmpeg stderr"))?;

        // Drain stderr concurrently so ffmpeg never blocks on a full pipe.
        let stderr_task = tokio::spawn(async move {
            let mut output = String::new();
            match stderr.read_to_string(&mut output).await {
                Ok(_) => output,
                Err(err) => format!("<failed to read ffmpeg stderr: {err}>"),
            }
        });

        let mut lines = BufReader::new(stdout).lines();
        let mut latest = ProgressState::default();
        let mut last_progress_secs = 0.0f64;
        let mut last_progress_wall = std::time::Instant::now();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| ReelError::render(format!("Failed reading ffmpeg progress: {e}")))?
        {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            latest.update(key, value);
            if key != "progress" {
                continue;
            }

            if latest.out_time_secs > last_progress_secs + 0.001 {
                last_progress_secs = latest.out_time_secs;
                last_progress_wall = std::time::Instant::now();
            }
            if let Some(cb) = &progress {
                cb(progress_report(
                    &latest,
                    plan.total_frames,
                    plan.expected_duration_secs,
                    start.elapsed().as_secs_f64(),
                ));
            }
            if last_progress_wall.elapsed().as_secs() >= 10 {
                tracing::warn!(
                    out_time_secs = latest.out_time_secs,
                    elapsed_secs = start.elapsed().as_secs_f64(),
                    "No ffmpeg progress advancement for 10s"
                );
                last_progress_wall = std::time::Instant::now();
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| ReelError::render(format!("Failed to wait on ffmpeg: {e}")))?;
        let stderr_output = stderr_task
            .await
            .unwrap_or_else(|_| "<failed to join stderr reader>".to_string());

        if !status.success() {
            return Err(ReelError::render(format!(
                "ffmpeg render failed (status {}): {}",
                status,
                stderr_output.trim()
            )));
        }

        if let Some(cb) = &progress {
            cb(RenderProgress::at_stage(RenderStage::Complete, plan.total_frames));
        }
        Ok(())
    }
}

fn slot_secs(slot: &SceneSlot, fps: u32) -> String {
    // One spare frame so rounding never starves the trim filter.
    format!("{:.6}", (slot.frames + 1) as f64 / fps.max(1) as f64)
}

fn staged_source(staging_dir: &Path, src: &str) -> ReelResult<String> {
    let path = staging_dir.join(src);
    if !path.exists() {
        return Err(ReelError::FileNotFound { path });
    }
    Ok(path.display().to_string())
}

fn scene_input_args(
    scene: &Scene,
    slot: &SceneSlot,
    timeline: &Timeline,
    staging_dir: &Path,
) -> ReelResult<Vec<String>> {
    let secs = slot_secs(slot, timeline.fps);
    let args = match (&scene.image_src, &scene.video_src) {
        (Some(image), _) => vec![
            "-loop".to_string(),
            "1".to_string(),
            "-framerate".to_string(),
            timeline.fps.to_string(),
            "-t".to_string(),
            secs,
            "-i".to_string(),
            staged_source(staging_dir, image)?,
        ],
        (None, Some(video)) => vec![
            "-stream_loop".to_string(),
            "-1".to_string(),
            "-t".to_string(),
            secs,
            "-i".to_string(),
            staged_source(staging_dir, video)?,
        ],
        (None, None) => vec![
            "-f".to_string(),
            "lavfi".to_string(),
            "-t".to_string(),
            secs,
            "-i".to_string(),
            format!(
                "color=c=black:s={}x{}:r={}",
                timeline.width, timeline.height, timeline.fps
            ),
        ],
    };
    Ok(args)
}

fn scene_filter(input: usize, scene: &Scene, slot: &SceneSlot, timeline: &Timeline) -> String {
    let (w, h, fps) = (timeline.width, timeline.height, timeline.fps);
    let mut chain = format!(
        "[{input}:v]scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,setsar=1,fps={fps},format=yuv420p,\
         trim=end_frame={frames},setpts=PTS-STARTPTS",
        frames = slot.frames
    );
    if scene.effects.glitch {
        let burst = GLITCH_SECS.min(slot.frames as f64 / fps.max(1) as f64);
        chain.push_str(&format!(
            ",noise=alls=60:allf=t+u:enable='lt(t,{burst:.3})',\
             rgbashift=rh=-12:bh=12:enable='lt(t,{burst:.3})'"
        ));
    }
    chain.push_str(&format!("[v{input}]"));
    chain
}

#[async_trait::async_trait]
impl RenderBackend for FfmpegSlideshowBackend {
    async fn render(
        &self,
        timeline: &Timeline,
        staging_dir: &Path,
        output_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> ReelResult<()> {
        let started = std::time::Instant::now();
        let plan = self.build_plan(timeline, staging_dir, output_path)?;
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        if let Some(cb) = &progress {
            cb(RenderProgress::at_stage(RenderStage::Preparing, plan.total_frames));
        }

        self.run_ffmpeg(&plan, progress).await?;
        tracing::info!(
            output = %output_path.display(),
            frames = plan.total_frames,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "Render finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists("ffmpeg")
    }

    fn name(&self) -> &str {
        "ffmpeg"
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    out_time_secs: f64,
    complete: bool,
}

impl ProgressState {
    fn update(&mut self, key: &str, value: &str) {
        match key {
            // ffmpeg reports microseconds under both keys.
            "out_time_ms" | "out_time_us" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
            }
            "progress" => {
                self.complete = value == "end";
            }
            _ => {}
        }
    }
}

fn progress_report(
    state: &ProgressState,
    total_frames: u64,
    expected_duration_secs: f64,
    elapsed_secs: f64,
) -> RenderProgress {
    let progress = if expected_duration_secs <= 0.0 {
        0.0
    } else {
        (state.out_time_secs / expected_duration_secs).clamp(0.0, 1.0)
    };

    let frames_rendered = (progress * total_frames as f64).round() as u64;
    let eta_secs = if progress > 0.0 {
        (elapsed_secs / progress) - elapsed_secs
    } else {
        0.0
    }
    .max(0.0);

    RenderProgress {
        progress: if state.complete { 1.0 } else { progress },
        frames_rendered,
        total_frames,
        eta_secs,
        stage: if state.complete {
            RenderStage::Finalizing
        } else {
            RenderStage::Rendering
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_model::timeline::SceneEffects;

    fn scene(index: usize, start: u64, frames: u64) -> Scene {
        Scene {
            index,
            text: format!("scene {index}"),
            image_src: None,
            video_src: None,
            start_frame: start,
            duration_frames: frames,
            effects: SceneEffects::default(),
        }
    }

    fn staged_timeline(dir: &Path) -> Timeline {
        std::fs::create_dir_all(dir.join("assets")).unwrap();
        std::fs::write(dir.join("audio.mp3"), b"").unwrap();
        std::fs::write(dir.join("assets/scene-000.png"), b"").unwrap();
        std::fs::write(dir.join("assets/scene-001.mp4"), b"").unwrap();

        let mut first = scene(0, 0, 78);
        first.image_src = Some("assets/scene-000.png".to_string());
        let mut second = scene(1, 77, 155);
        second.video_src = Some("assets/scene-001.mp4".to_string());
        second.effects.glitch = true;
        let third = scene(2, 231, 39);

        Timeline {
            width: 1920,
            height: 1080,
            fps: 30,
            duration_in_frames: 270,
            audio_src: "audio.mp3".to_string(),
            scenes: vec![first, second, third],
        }
    }

    fn backend() -> FfmpegSlideshowBackend {
        FfmpegSlideshowBackend::new(&RenderSettings::default())
    }

    #[test]
    fn test_plan_inputs_follow_scene_kinds() {
        let dir = tempfile::tempdir().unwrap();
        let timeline = staged_timeline(dir.path());
        let plan = backend()
            .build_plan(&timeline, dir.path(), &dir.path().join("out.mp4"))
            .unwrap();
        let args = plan.ffmpeg_args.join(" ");

        assert!(args.contains("-loop 1 -framerate 30"));
        assert!(args.contains("-stream_loop -1"));
        assert!(args.contains("color=c=black:s=1920x1080:r=30"));
        assert!(args.contains("-map 3:a:0"));
        assert!(args.contains("-frames:v 270"));
        assert_eq!(plan.total_frames, 270);
        assert!((plan.expected_duration_secs - 9.0).abs() < 1e-9);
    }

    #[test]
    fn test_filter_trims_to_slots_and_glitches_flagged_scene() {
        let dir = tempfile::tempdir().unwrap();
        let timeline = staged_timeline(dir.path());
        let plan = backend()
            .build_plan(&timeline, dir.path(), &dir.path().join("out.mp4"))
            .unwrap();
        let filter_at = plan
            .ffmpeg_args
            .iter()
            .position(|a| a == "-filter_complex")
            .unwrap();
        let filter = &plan.ffmpeg_args[filter_at + 1];

        // Slots: 0..77, 77..231, 231..270.
        assert!(filter.contains("[0:v]scale=1920:1080"));
        assert!(filter.contains("trim=end_frame=77,"));
        assert!(filter.contains("trim=end_frame=154,"));
        assert!(filter.contains("trim=end_frame=39,"));
        assert_eq!(filter.matches("noise=").count(), 1);
        assert!(filter.ends_with("[v0][v1][v2]concat=n=3:v=1:a=0[vout]"));
    }

    #[test]
    fn test_missing_staged_source_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let timeline = staged_timeline(dir.path());
        std::fs::remove_file(dir.path().join("assets/scene-001.mp4")).unwrap();

        let err = backend()
            .build_plan(&timeline, dir.path(), &dir.path().join("out.mp4"))
            .unwrap_err();
        assert!(matches!(err, ReelError::FileNotFound { .. }));
    }

    #[test]
    fn test_invalid_timeline_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut timeline = staged_timeline(dir.path());
        timeline.duration_in_frames = 300;
        let err = backend()
            .build_plan(&timeline, dir.path(), &dir.path().join("out.mp4"))
            .unwrap_err();
        assert!(err.to_string().contains("invalid timeline"));
    }

    #[test]
    fn test_progress_report_from_ffmpeg_keys() {
        let mut state = ProgressState::default();
        state.update("out_time_us", "4500000");
        state.update("progress", "continue");

        let report = progress_report(&state, 270, 9.0, 3.0);
        assert!((report.progress - 0.5).abs() < 1e-9);
        assert_eq!(report.frames_rendered, 135);
        assert!((report.eta_secs - 3.0).abs() < 1e-9);
        assert_eq!(report.stage, RenderStage::Rendering);

        state.update("progress", "end");
        let report = progress_report(&state, 270, 9.0, 6.0);
        assert_eq!(report.progress, 1.0);
        assert_eq!(report.stage, RenderStage::Finalizing);
    }
}
