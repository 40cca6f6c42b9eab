//! Media probing helpers.

use std::path::Path;
use std::process::Stdio;

use storyreel_common::error::{ReelError, ReelResult};

/// A source of media durations.
#[async_trait::async_trait]
pub trait DurationProbe: Send + Sync {
    /// Duration of the media file in seconds.
    async fn duration_secs(&self, path: &Path) -> ReelResult<f64>;
}

/// Reads `format=duration` with ffprobe.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfprobeDurationProbe;

#[async_trait::async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration_secs(&self, path: &Path) -> ReelResult<f64> {
        if !path.exists() {
            return Err(ReelError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let output = tokio::process::Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| ReelError::probe(format!("failed to start ffprobe: {e}")))?;

        if !output.status.success() {
            return Err(ReelError::probe(format!(
                "ffprobe failed on {} ({}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_ffprobe_duration(&raw).ok_or_else(|| {
            ReelError::probe(format!(
                "ffprobe reported no usable duration for {}: {:?}",
                path.display(),
                raw.trim()
            ))
        })
    }
}

/// Parse the first line of ffprobe's bare `format=duration` output.
pub fn parse_ffprobe_duration(raw: &str) -> Option<f64> {
    let value = raw.lines().next()?.trim().parse::<f64>().ok()?;
    (value.is_finite() && value > 0.0).then_some(value)
}

/// Whether `program` names an executable, either as a path or by a lookup
/// on the current `PATH`.
pub fn command_exists(program: &str) -> bool {
    if program.trim().is_empty() {
        return false;
    }
    if program.contains(std::path::MAIN_SEPARATOR) || program.contains('/') {
        return is_executable(Path::new(program));
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program))))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file() || path.with_extension("exe").is_file()
}
