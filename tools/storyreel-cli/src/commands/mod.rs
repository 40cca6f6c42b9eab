//! CLI subcommand implementations.

pub mod align;
pub mod check;
pub mod render;
pub mod serve;
pub mod status;
pub mod timeline;

use std::path::Path;

use storyreel_audio::probe::{DurationProbe, FfprobeDurationProbe};
use storyreel_model::request::RenderRequest;

/// Load and validate a request manifest.
pub(crate) fn load_request(manifest: &Path) -> anyhow::Result<RenderRequest> {
    let request = RenderRequest::load(manifest)
        .map_err(|e| anyhow::anyhow!("Failed to load manifest: {e}"))?;
    request.validate()?;
    Ok(request)
}

/// The manifest's declared duration, or the probed length of `audio`.
pub(crate) async fn voice_over_duration(request: &RenderRequest, audio: &Path) -> anyhow::Result<f64> {
    match request.duration_secs {
        Some(secs) => Ok(secs),
        None => Ok(FfprobeDurationProbe.duration_secs(audio).await?),
    }
}
