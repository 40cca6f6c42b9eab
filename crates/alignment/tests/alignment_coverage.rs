use std::path::Path;
use std::sync::Arc;

use proptest::prelude::*;
use storyreel_alignment::boundaries::{proportional_boundaries, seal_boundaries};
use storyreel_alignment::AlignmentEngine;
use storyreel_audio::silence::{AudibleSpan, SilenceDetector};
use storyreel_audio::transcription::{Transcript, TranscriptionClient, TranscriptionSegment};
use storyreel_common::config::AlignmentSettings;
use storyreel_common::error::ReelResult;
use storyreel_model::request::SentenceInput;
use storyreel_model::timing::{validate_timings, AlignmentTier};

struct ScriptedTranscriber(Vec<TranscriptionSegment>);

#[async_trait::async_trait]
impl TranscriptionClient for ScriptedTranscriber {
    async fn transcribe(&self, _audio_path: &Path) -> ReelResult<Transcript> {
        Ok(Transcript::from_segments(self.0.clone()))
    }

    fn label(&self) -> &str {
        "scripted"
    }
}

struct ScriptedDetector(Vec<AudibleSpan>);

#[async_trait::async_trait]
impl SilenceDetector for ScriptedDetector {
    async fn detect_audible(&self, _audio_path: &Path) -> ReelResult<Vec<AudibleSpan>> {
        Ok(self.0.clone())
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
}

fn reference_sentences() -> Vec<SentenceInput> {
    ["Hello world", "This is a test", "Goodbye"]
        .into_iter()
        .map(SentenceInput::new)
        .collect()
}

#[tokio::test]
async fn proportional_reference_scenario() {
    let engine = AlignmentEngine::new(AlignmentSettings::default())
        .with_transcribers(vec![Arc::new(ScriptedTranscriber(vec![]))]);
    let outcome = engine
        .align(Path::new("voice.mp3"), &reference_sentences(), 9.0)
        .await
        .unwrap();

    assert_eq!(outcome.tier, AlignmentTier::Proportional);
    let t = &outcome.timings;
    assert_eq!(t[0].start_seconds, 0.0);
    assert!((t[0].end_seconds - 2.571).abs() < 0.001);
    assert!((t[1].end_seconds - 7.714).abs() < 0.001);
    assert_eq!(t[2].end_seconds, 9.0);
    validate_timings(t, 9.0).unwrap();
}

#[tokio::test]
async fn single_sentence_covers_whole_track() {
    let engine = AlignmentEngine::new(AlignmentSettings::default());
    let outcome = engine
        .align(Path::new("voice.mp3"), &[SentenceInput::new("Only one")], 4.25)
        .await
        .unwrap();
    assert_eq!(outcome.timings.len(), 1);
    assert_eq!(outcome.timings[0].start_seconds, 0.0);
    assert_eq!(outcome.timings[0].end_seconds, 4.25);
}

#[tokio::test]
async fn track_shorter_than_minimums_is_split_evenly() {
    let sentences: Vec<_> = (0..10).map(|i| SentenceInput::new(format!("s{i}"))).collect();
    let engine = AlignmentEngine::new(AlignmentSettings::default());
    let outcome = engine
        .align(Path::new("voice.mp3"), &sentences, 0.5)
        .await
        .unwrap();
    validate_timings(&outcome.timings, 0.5).unwrap();
    for timing in &outcome.timings {
        assert!((timing.duration_secs() - 0.05).abs() < 1e-9);
    }
}

#[tokio::test]
async fn partial_transcript_match_hands_remainder_to_proportional_split() {
    let engine = AlignmentEngine::new(AlignmentSettings::default()).with_transcribers(vec![
        Arc::new(ScriptedTranscriber(vec![TranscriptionSegment::new(
            0.0, 2.0, "Hello world",
        )])),
    ]);
    let outcome = engine
        .align(Path::new("voice.mp3"), &reference_sentences(), 10.0)
        .await
        .unwrap();

    assert_eq!(outcome.tier, AlignmentTier::Transcript);
    assert_eq!(outcome.matched_sentences, 1);
    assert_eq!(outcome.timings[1].start_seconds, 2.0);
    assert!((outcome.timings[1].end_seconds - 8.4).abs() < 1e-9);
    assert_eq!(outcome.timings[2].end_seconds, 10.0);
}

fn sentence_strategy() -> impl Strategy<Value = Vec<SentenceInput>> {
    prop::collection::vec("[a-z]{1,8}( [a-z]{1,8}){0,6}[.!?]?", 1..12)
        .prop_map(|texts| texts.into_iter().map(SentenceInput::new).collect())
}

fn span_strategy() -> impl Strategy<Value = Vec<AudibleSpan>> {
    prop::collection::vec((0.0f64..60.0, 0.0f64..5.0), 0..8).prop_map(|raw| {
        raw.into_iter()
            .map(|(start, len)| AudibleSpan::new(start, start + len))
            .collect()
    })
}

proptest! {
    #[test]
    fn proportional_boundaries_are_monotonic_and_pinned(
        weights in prop::collection::vec(0usize..40, 1..20),
        end in 0.5f64..600.0,
    ) {
        let bounds = proportional_boundaries(&weights, 0.0, end, 0.0);
        prop_assert_eq!(bounds.len(), weights.len() + 1);
        prop_assert_eq!(bounds[0], 0.0);
        prop_assert_eq!(bounds[weights.len()], end);
        for pair in bounds.windows(2) {
            prop_assert!(pair[1] >= pair[0]);
        }
    }

    #[test]
    fn sealing_always_tiles_the_track(
        raw in prop::collection::vec(-10.0f64..100.0, 2..20),
        total in 0.01f64..90.0,
        min in 0.0f64..0.5,
    ) {
        let sealed = seal_boundaries(&raw, total, min);
        prop_assert_eq!(sealed.len(), raw.len());
        prop_assert_eq!(sealed[0], 0.0);
        prop_assert_eq!(sealed[sealed.len() - 1], total);
        for pair in sealed.windows(2) {
            prop_assert!(pair[1] > pair[0], "{:?}", sealed);
        }
    }

    #[test]
    fn every_tier_produces_contiguous_coverage(
        sentences in sentence_strategy(),
        spans in span_strategy(),
        total in 0.05f64..120.0,
        transcript_text in "[a-z]{1,8}( [a-z]{1,8}){0,20}",
    ) {
        let rt = runtime();
        let path = Path::new("voice.mp3");

        let transcript_engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_transcribers(vec![Arc::new(ScriptedTranscriber(vec![
                TranscriptionSegment::new(0.0, total, transcript_text),
            ]))]);
        let vad_engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_silence_detector(Arc::new(ScriptedDetector(spans)));

        for engine in [&transcript_engine, &vad_engine] {
            let outcome = rt.block_on(engine.align(path, &sentences, total)).unwrap();
            prop_assert_eq!(outcome.timings.len(), sentences.len());
            prop_assert!(validate_timings(&outcome.timings, total).is_ok());
            for (timing, sentence) in outcome.timings.iter().zip(&sentences) {
                prop_assert_eq!(&timing.text, &sentence.text);
            }
        }
    }

    #[test]
    fn alignment_is_deterministic(sentences in sentence_strategy(), total in 1.0f64..60.0) {
        let rt = runtime();
        let engine = AlignmentEngine::new(AlignmentSettings::default());
        let first = rt.block_on(engine.align(Path::new("voice.mp3"), &sentences, total)).unwrap();
        let second = rt.block_on(engine.align(Path::new("voice.mp3"), &sentences, total)).unwrap();
        prop_assert_eq!(first, second);
    }
}
