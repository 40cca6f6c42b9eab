//! Caption generation in SRT and VTT formats.

use storyreel_common::error::ReelResult;
use storyreel_model::timing::SentenceTiming;

/// Generate SRT caption content from sentence timings.
pub fn generate_srt(timings: &[SentenceTiming]) -> String {
    let mut output = String::new();

    for (i, timing) in timings.iter().enumerate() {
        output.push_str(&format!("{}\n", i + 1));
        output.push_str(&format!(
            "{} --> {}\n",
            format_srt_time(timing.start_seconds),
            format_srt_time(timing.end_seconds),
        ));
        output.push_str(timing.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Generate WebVTT caption content from sentence timings.
pub fn generate_vtt(timings: &[SentenceTiming]) -> String {
    let mut output = String::from("WEBVTT\n\n");

    for timing in timings {
        output.push_str(&format!(
            "{} --> {}\n",
            format_vtt_time(timing.start_seconds),
            format_vtt_time(timing.end_seconds),
        ));
        output.push_str(timing.text.trim());
        output.push_str("\n\n");
    }

    output
}

/// Format seconds as SRT timestamp: HH:MM:SS,mmm
fn format_srt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_time(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}

/// Format seconds as VTT timestamp: HH:MM:SS.mmm
fn format_vtt_time(secs: f64) -> String {
    let (hours, minutes, seconds, millis) = split_time(secs);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

fn split_time(secs: f64) -> (u64, u64, u64, u64) {
    let total_ms = (secs.max(0.0) * 1000.0).round() as u64;
    (
        total_ms / 3_600_000,
        (total_ms % 3_600_000) / 60_000,
        (total_ms % 60_000) / 1000,
        total_ms % 1000,
    )
}

/// Save captions to a file; `.vtt` selects WebVTT, anything else SRT.
pub async fn save_captions(timings: &[SentenceTiming], path: &std::path::Path) -> ReelResult<()> {
    let content = match path.extension().and_then(|e| e.to_str()) {
        Some("vtt") => generate_vtt(timings),
        _ => generate_srt(timings),
    };
    tokio::fs::write(path, content).await?;
    Ok(())
}
