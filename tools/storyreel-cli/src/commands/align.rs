//! Align a manifest's sentences and print the timings.

use std::path::PathBuf;

use serde_json::json;
use storyreel_alignment::AlignmentEngine;
use storyreel_common::config::AppConfig;

use super::{load_request, voice_over_duration};

pub async fn run(config: &AppConfig, manifest: PathBuf) -> anyhow::Result<()> {
    let request = load_request(&manifest)?;
    let duration = voice_over_duration(&request, &request.audio_path).await?;

    let engine = AlignmentEngine::from_config(config);
    let outcome = engine
        .align(&request.audio_path, &request.sentences, duration)
        .await?;

    eprintln!(
        "Aligned {} sentences over {duration:.2}s using the {} tier",
        outcome.timings.len(),
        outcome.tier
    );
    let report = json!({
        "tier": outcome.tier,
        "matchedSentences": outcome.matched_sentences,
        "timings": outcome.timings,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
