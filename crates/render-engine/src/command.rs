//! External renderer driven by a command template.
//!
//! Used for renderers that consume `timeline.json` directly, such as a
//! Remotion project invoked through `npx remotion render`.

use std::path::Path;
use std::process::Stdio;

use storyreel_audio::probe::command_exists;
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::timeline::Timeline;

use crate::backend::{ProgressCallback, RenderBackend, RenderProgress, RenderStage};
use crate::staging::write_timeline;

#[derive(Debug, Clone)]
pub struct CommandRenderBackend {
    program: String,
    args: Vec<String>,
}

impl CommandRenderBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Arguments with `{timeline}`, `{staging}` and `{output}` filled in.
    pub fn render_args(&self, timeline_path: &Path, staging_dir: &Path, output_path: &Path) -> Vec<String> {
        let timeline = timeline_path.display().to_string();
        let staging = staging_dir.display().to_string();
        let output = output_path.display().to_string();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{timeline}", &timeline)
                    .replace("{staging}", &staging)
                    .replace("{output}", &output)
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl RenderBackend for CommandRenderBackend {
    async fn render(
        &self,
        timeline: &Timeline,
        staging_dir: &Path,
        output_path: &Path,
        progress: Option<ProgressCallback>,
    ) -> ReelResult<()> {
        if self.program.is_empty() {
            return Err(ReelError::config("command render backend has no program configured"));
        }
        if let Some(parent) = output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let timeline_path = write_timeline(staging_dir, timeline).await?;
        let args = self.render_args(&timeline_path, staging_dir, output_path);
        if let Some(cb) = &progress {
            cb(RenderProgress::at_stage(RenderStage::Rendering, timeline.duration_in_frames));
        }

        tracing::info!(program = %self.program, args = ?args, "Running external renderer");
        let started = std::time::Instant::now();
        let output = tokio::process::Command::new(&self.program)
            .args(&args)
            .current_dir(staging_dir)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ReelError::render(format!("Failed to start {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(ReelError::render(format!(
                "{} failed (status {}): {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        if !tokio::fs::try_exists(output_path).await.unwrap_or(false) {
            return Err(ReelError::render(format!(
                "{} exited successfully but wrote no file at {}",
                self.program,
                output_path.display()
            )));
        }

        if let Some(cb) = &progress {
            cb(RenderProgress::at_stage(RenderStage::Complete, timeline.duration_in_frames));
        }
        tracing::info!(
            output = %output_path.display(),
            elapsed_secs = started.elapsed().as_secs_f64(),
            "External render finished"
        );
        Ok(())
    }

    fn is_available(&self) -> bool {
        command_exists(&self.program)
    }

    fn name(&self) -> &str {
        "command"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_model::timeline::{Scene, SceneEffects};

    fn timeline() -> Timeline {
        Timeline {
            width: 1080,
            height: 1920,
            fps: 30,
            duration_in_frames: 30,
            audio_src: "audio.mp3".to_string(),
            scenes: vec![Scene {
                index: 0,
                text: "Hello".to_string(),
                image_src: None,
                video_src: None,
                start_frame: 0,
                duration_frames: 30,
                effects: SceneEffects::default(),
            }],
        }
    }

    #[test]
    fn test_unset_or_missing_program_is_unavailable() {
        assert!(!CommandRenderBackend::new("", vec![]).is_available());
        assert!(!CommandRenderBackend::new("/opt/renderer/missing", vec![]).is_available());
        assert!(CommandRenderBackend::new("sh", vec![]).is_available());
    }

    #[test]
    fn test_placeholders_are_substituted() {
        let backend = CommandRenderBackend::new(
            "npx",
            vec![
                "remotion".to_string(),
                "render".to_string(),
                "--props={timeline}".to_string(),
                "{output}".to_string(),
            ],
        );
        let args = backend.render_args(
            Path::new("/stage/timeline.json"),
            Path::new("/stage"),
            Path::new("/out/job.mp4"),
        );
        assert_eq!(
            args,
            vec!["remotion", "render", "--props=/stage/timeline.json", "/out/job.mp4"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command_must_write_output() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out/video.mp4");

        let backend = CommandRenderBackend::new(
            "sh",
            vec!["-c".to_string(), "cp {timeline} {output}".to_string()],
        );
        backend
            .render(&timeline(), dir.path(), &output, None)
            .await
            .unwrap();
        assert!(output.exists());

        let lazy = CommandRenderBackend::new("sh", vec!["-c".to_string(), "true".to_string()]);
        let err = lazy
            .render(&timeline(), dir.path(), &dir.path().join("missing.mp4"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("wrote no file"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let backend = CommandRenderBackend::new(
            "sh",
            vec!["-c".to_string(), "echo 'composition not found' >&2; exit 3".to_string()],
        );
        let err = backend
            .render(&timeline(), dir.path(), &dir.path().join("v.mp4"), None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("composition not found"));
    }
}
