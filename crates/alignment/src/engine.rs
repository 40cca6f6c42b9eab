//! Alignment orchestration across the three tiers.

use std::path::Path;
use std::sync::Arc;

use storyreel_audio::silence::{FfmpegSilenceDetector, SilenceDetector};
use storyreel_audio::transcription::{transcribers_from_config, Transcript, TranscriptionClient};
use storyreel_common::config::{AlignmentSettings, AppConfig};
use storyreel_common::error::{ReelError, ReelResult};
use storyreel_model::request::SentenceInput;
use storyreel_model::timing::{validate_timings, AlignmentTier, SentenceTiming};

use crate::boundaries::{proportional_boundaries, seal_boundaries, timings_from_boundaries};
use crate::text::sentence_weight;
use crate::transcript::transcript_boundaries;
use crate::voice_activity::voice_activity_boundaries;
use crate::words::{build_word_timeline, WordTiming};

/// Primary transcription plus one alternate.
const MAX_TRANSCRIPTION_ATTEMPTS: usize = 2;

/// Timings together with how they were obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignmentOutcome {
    pub timings: Vec<SentenceTiming>,
    /// Tier that produced the boundaries.
    pub tier: AlignmentTier,
    /// Leading sentences located in the transcript (transcript tier only).
    pub matched_sentences: usize,
}

/// Assigns every sentence a contiguous interval of the voice-over.
///
/// Collaborators are optional: with no transcriber the transcript tier is
/// skipped, and with no silence detector the engine goes straight to the
/// proportional split.
pub struct AlignmentEngine {
    settings: AlignmentSettings,
    transcribers: Vec<Arc<dyn TranscriptionClient>>,
    silence_detector: Option<Arc<dyn SilenceDetector>>,
}

impl AlignmentEngine {
    pub fn new(settings: AlignmentSettings) -> Self {
        Self {
            settings,
            transcribers: vec![],
            silence_detector: None,
        }
    }

    /// Engine wired to the configured transcription strategies and, when
    /// enabled, ffmpeg silence detection.
    pub fn from_config(config: &AppConfig) -> Self {
        let engine = Self::new(config.alignment)
            .with_transcribers(transcribers_from_config(&config.transcription.strategies));
        if config.silence.enabled {
            engine.with_silence_detector(Arc::new(FfmpegSilenceDetector::new(&config.silence)))
        } else {
            engine
        }
    }

    /// Transcription strategies in preference order.
    pub fn with_transcribers(mut self, transcribers: Vec<Arc<dyn TranscriptionClient>>) -> Self {
        self.transcribers = transcribers;
        self
    }

    pub fn with_silence_detector(mut self, detector: Arc<dyn SilenceDetector>) -> Self {
        self.silence_detector = Some(detector);
        self
    }

    pub fn settings(&self) -> &AlignmentSettings {
        &self.settings
    }

    /// Align `sentences` to the audio at `audio_path`, which lasts
    /// `total_secs`.
    ///
    /// Only invalid input is an error. Collaborator failures degrade to the
    /// next tier, and the proportional tier cannot fail.
    pub async fn align(
        &self,
        audio_path: &Path,
        sentences: &[SentenceInput],
        total_secs: f64,
    ) -> ReelResult<AlignmentOutcome> {
        if sentences.is_empty() {
            return Err(ReelError::alignment("no sentences to align"));
        }
        if !total_secs.is_finite() || total_secs <= 0.0 {
            return Err(ReelError::alignment(format!(
                "audio duration must be positive, got {total_secs}"
            )));
        }

        let weights: Vec<usize> = sentences.iter().map(|s| sentence_weight(&s.text)).collect();

        if let Some(words) = self.transcript_words(audio_path).await {
            let result = transcript_boundaries(&words, sentences, total_secs, &self.settings);
            if result.matched > 0 {
                if let Some(outcome) = self.finish(
                    sentences,
                    &result.boundaries,
                    total_secs,
                    AlignmentTier::Transcript,
                    result.matched,
                ) {
                    return Ok(outcome);
                }
            } else {
                tracing::warn!(
                    words = words.len(),
                    sentences = sentences.len(),
                    "Transcript matched no sentences; falling back"
                );
            }
        }

        if let Some(detector) = &self.silence_detector {
            match detector.detect_audible(audio_path).await {
                Ok(spans) => {
                    if let Some(raw) =
                        voice_activity_boundaries(&spans, &weights, total_secs, &self.settings)
                    {
                        if let Some(outcome) = self.finish(
                            sentences,
                            &raw,
                            total_secs,
                            AlignmentTier::VoiceActivity,
                            0,
                        ) {
                            return Ok(outcome);
                        }
                    } else {
                        tracing::warn!("No audible spans detected; using proportional split");
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Silence detection failed; using proportional split");
                }
            }
        }

        Ok(self.proportional(sentences, &weights, total_secs))
    }

    /// Word timeline from the first strategy that yields usable segments.
    async fn transcript_words(&self, audio_path: &Path) -> Option<Vec<WordTiming>> {
        for client in self.transcribers.iter().take(MAX_TRANSCRIPTION_ATTEMPTS) {
            match client.transcribe(audio_path).await {
                Ok(Transcript::Usable(segments)) => {
                    let words = build_word_timeline(&segments);
                    if !words.is_empty() {
                        tracing::info!(
                            strategy = client.label(),
                            segments = segments.len(),
                            words = words.len(),
                            "Transcript available"
                        );
                        return Some(words);
                    }
                    tracing::warn!(strategy = client.label(), "Transcript contained no words");
                }
                Ok(Transcript::Unusable(reason)) => {
                    tracing::warn!(strategy = client.label(), %reason, "Transcript unusable");
                }
                Err(e) => {
                    tracing::warn!(strategy = client.label(), error = %e, "Transcription failed");
                }
            }
        }

        if self.transcribers.len() > MAX_TRANSCRIPTION_ATTEMPTS {
            tracing::debug!(
                configured = self.transcribers.len(),
                "Ignoring transcription strategies past the alternate"
            );
        }
        None
    }

    /// Seal and validate raw boundaries; `None` means the tier is discarded.
    fn finish(
        &self,
        sentences: &[SentenceInput],
        raw: &[f64],
        total_secs: f64,
        tier: AlignmentTier,
        matched_sentences: usize,
    ) -> Option<AlignmentOutcome> {
        if raw.len() != sentences.len() + 1 {
            tracing::warn!(
                %tier,
                boundaries = raw.len(),
                sentences = sentences.len(),
                "Boundary count mismatch"
            );
            return None;
        }

        let sealed = seal_boundaries(raw, total_secs, self.settings.min_sentence_secs);
        let timings = timings_from_boundaries(sentences, &sealed);
        match validate_timings(&timings, total_secs) {
            Ok(()) => {
                tracing::info!(
                    %tier,
                    sentences = timings.len(),
                    matched = matched_sentences,
                    total_secs,
                    "Alignment complete"
                );
                Some(AlignmentOutcome {
                    timings,
                    tier,
                    matched_sentences,
                })
            }
            Err(e) => {
                tracing::warn!(%tier, error = %e, "Alignment failed validation");
                None
            }
        }
    }

    fn proportional(
        &self,
        sentences: &[SentenceInput],
        weights: &[usize],
        total_secs: f64,
    ) -> AlignmentOutcome {
        let raw = proportional_boundaries(weights, 0.0, total_secs, self.settings.min_sentence_secs);
        if let Some(outcome) =
            self.finish(sentences, &raw, total_secs, AlignmentTier::Proportional, 0)
        {
            return outcome;
        }

        // Only reachable through float degeneracy; an even split always tiles.
        let n = sentences.len();
        let mut even: Vec<f64> = (0..=n).map(|i| total_secs * i as f64 / n as f64).collect();
        even[n] = total_secs;
        AlignmentOutcome {
            timings: timings_from_boundaries(sentences, &even),
            tier: AlignmentTier::Proportional,
            matched_sentences: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_audio::silence::AudibleSpan;
    use storyreel_audio::transcription::TranscriptionSegment;

    struct FixedTranscriber(Transcript);

    #[async_trait::async_trait]
    impl TranscriptionClient for FixedTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> ReelResult<Transcript> {
            Ok(self.0.clone())
        }

        fn label(&self) -> &str {
            "fixed"
        }
    }

    struct FailingTranscriber;

    #[async_trait::async_trait]
    impl TranscriptionClient for FailingTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> ReelResult<Transcript> {
            Err(ReelError::transcription("model unavailable"))
        }

        fn label(&self) -> &str {
            "failing"
        }
    }

    struct FixedDetector(Vec<AudibleSpan>);

    #[async_trait::async_trait]
    impl SilenceDetector for FixedDetector {
        async fn detect_audible(&self, _audio_path: &Path) -> ReelResult<Vec<AudibleSpan>> {
            Ok(self.0.clone())
        }
    }

    fn sentences() -> Vec<SentenceInput> {
        ["Hello world", "This is a test", "Goodbye"]
            .into_iter()
            .map(SentenceInput::new)
            .collect()
    }

    fn transcript() -> Transcript {
        Transcript::from_segments(vec![
            TranscriptionSegment::new(0.2, 1.8, "Hello world."),
            TranscriptionSegment::new(2.5, 6.5, "This is a test."),
            TranscriptionSegment::new(7.0, 8.5, "Goodbye!"),
        ])
    }

    #[tokio::test]
    async fn test_rejects_empty_input() {
        let engine = AlignmentEngine::new(AlignmentSettings::default());
        assert!(engine.align(Path::new("a.mp3"), &[], 9.0).await.is_err());
        assert!(engine
            .align(Path::new("a.mp3"), &sentences(), 0.0)
            .await
            .is_err());
        assert!(engine
            .align(Path::new("a.mp3"), &sentences(), f64::NAN)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_transcript_tier_preferred() {
        let engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_transcribers(vec![Arc::new(FixedTranscriber(transcript()))]);
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences(), 9.0)
            .await
            .unwrap();

        assert_eq!(outcome.tier, AlignmentTier::Transcript);
        assert_eq!(outcome.matched_sentences, 3);
        assert_eq!(outcome.timings[1].start_seconds, 2.5);
        assert_eq!(outcome.timings[2].start_seconds, 7.0);
        assert_eq!(outcome.timings[2].end_seconds, 9.0);
    }

    #[tokio::test]
    async fn test_alternate_transcriber_used_after_failure() {
        let engine = AlignmentEngine::new(AlignmentSettings::default()).with_transcribers(vec![
            Arc::new(FailingTranscriber),
            Arc::new(FixedTranscriber(transcript())),
        ]);
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences(), 9.0)
            .await
            .unwrap();
        assert_eq!(outcome.tier, AlignmentTier::Transcript);
    }

    #[tokio::test]
    async fn test_only_one_alternate_is_tried() {
        let engine = AlignmentEngine::new(AlignmentSettings::default()).with_transcribers(vec![
            Arc::new(FailingTranscriber),
            Arc::new(FailingTranscriber),
            Arc::new(FixedTranscriber(transcript())),
        ]);
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences(), 9.0)
            .await
            .unwrap();
        assert_eq!(outcome.tier, AlignmentTier::Proportional);
    }

    #[tokio::test]
    async fn test_voice_activity_used_without_transcript() {
        let engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_transcribers(vec![Arc::new(FixedTranscriber(Transcript::Unusable(
                "empty".to_string(),
            )))])
            .with_silence_detector(Arc::new(FixedDetector(vec![
                AudibleSpan::new(1.0, 3.0),
                AudibleSpan::new(5.0, 9.0),
            ])));
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences()[..2], 10.0)
            .await
            .unwrap();

        assert_eq!(outcome.tier, AlignmentTier::VoiceActivity);
        assert_eq!(outcome.timings[0].start_seconds, 0.0);
        assert_eq!(outcome.timings[1].end_seconds, 10.0);
    }

    #[tokio::test]
    async fn test_silent_track_falls_back_to_proportional() {
        let engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_silence_detector(Arc::new(FixedDetector(vec![])));
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences(), 9.0)
            .await
            .unwrap();
        assert_eq!(outcome.tier, AlignmentTier::Proportional);
    }

    #[tokio::test]
    async fn test_unmatched_transcript_is_reported_as_proportional() {
        let unrelated = Transcript::from_segments(vec![TranscriptionSegment::new(
            0.0,
            9.0,
            "completely unrelated narration here",
        )]);
        let engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_transcribers(vec![Arc::new(FixedTranscriber(unrelated))]);
        let outcome = engine
            .align(Path::new("a.mp3"), &sentences(), 9.0)
            .await
            .unwrap();
        assert_eq!(outcome.tier, AlignmentTier::Proportional);
        assert_eq!(outcome.matched_sentences, 0);
    }

    #[tokio::test]
    async fn test_unmatched_transcript_falls_through_to_voice_activity() {
        let unrelated = Transcript::from_segments(vec![TranscriptionSegment::new(
            0.0,
            10.0,
            "zzz qqq xxx",
        )]);
        let engine = AlignmentEngine::new(AlignmentSettings::default())
            .with_transcribers(vec![Arc::new(FixedTranscriber(unrelated))])
            .with_silence_detector(Arc::new(FixedDetector(vec![AudibleSpan::new(5.0, 9.0)])));
        let two = [SentenceInput::new("Hello world"), SentenceInput::new("Goodbye")];
        let outcome = engine.align(Path::new("a.mp3"), &two, 10.0).await.unwrap();

        assert_eq!(outcome.tier, AlignmentTier::VoiceActivity);
        assert_eq!(outcome.matched_sentences, 0);
        // Two thirds of the 4s of speech, mapped back onto the span at 5s.
        assert!((outcome.timings[0].end_seconds - (5.0 + 8.0 / 3.0)).abs() < 1e-9);
        assert_eq!(outcome.timings[1].end_seconds, 10.0);
    }
}
