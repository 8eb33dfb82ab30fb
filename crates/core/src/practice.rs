//! Practice orchestrator: drives one attempt through
//! record → stop → upload + analyze → scored outcome.
//!
//! The outcome, including the recording that produced it, is handed to the
//! caller by return value and is consumed exactly once; there is no shared
//! holder between the practice flow and whoever presents the result.

use crate::api::IntonationApi;
use crate::audio::{AudioBackend, AudioSessionManager};
use crate::catalog::Level;
use crate::error::Result;
use crate::models::RecordingArtifact;
use crate::progress::ProgressLedger;
use intona_api::AnalysisDetails;
use thiserror::Error;

/// A level is passed once its floored score reaches this value.
pub const PASS_THRESHOLD: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PracticeError {
    /// `analyze` was called without a finished recording to upload.
    #[error("no finished recording to analyze")]
    NothingRecorded,

    /// The server rejected the upload because the phrase did not match
    /// (HTTP 400). The user should re-record rather than retry as-is.
    #[error("phrase did not match, ask the user to re-record")]
    PhraseMismatch,

    /// Anything else went wrong; the attempt can be retried later.
    #[error("analysis failed, try again later")]
    Failed,
}

/// Scored result of one analyzed attempt.
#[derive(Debug, Clone)]
pub struct PracticeOutcome {
    pub level_id: String,
    /// Floored to two decimals, never rounded: 79.999 reads as 79.99 and
    /// stays below the pass threshold.
    pub score: f32,
    pub passed: bool,
    pub feedback: String,
    pub graph_url: String,
    pub details: AnalysisDetails,
    /// What the server expected, when the phrase check failed softly.
    pub expected_phrase: Option<String>,
    /// The recording behind this outcome; released when the outcome is
    /// dropped by its consumer.
    pub recording: RecordingArtifact,
}

pub struct PracticeOrchestrator<A: IntonationApi, B: AudioBackend> {
    api: A,
    audio: AudioSessionManager<B>,
    ledger: ProgressLedger,
}

impl<A: IntonationApi, B: AudioBackend> PracticeOrchestrator<A, B> {
    pub fn new(api: A, audio: AudioSessionManager<B>, ledger: ProgressLedger) -> Self {
        Self { api, audio, ledger }
    }

    /// The underlying audio manager, for playback of references and
    /// recordings around the attempt.
    pub fn audio(&self) -> &AudioSessionManager<B> {
        &self.audio
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub async fn start_recording(&self) -> Result<RecordingArtifact> {
        self.audio.start_recording().await
    }

    pub async fn stop_recording(&self) -> Result<RecordingArtifact> {
        self.audio.stop_recording().await
    }

    /// Uploads the finished recording for `level` and maps the response to
    /// a [`PracticeOutcome`], marking the level passed when the floored
    /// score reaches [`PASS_THRESHOLD`].
    pub async fn analyze(&self, level: &Level) -> std::result::Result<PracticeOutcome, PracticeError> {
        let Some(recording) = self.audio.take_recording().await else {
            return Err(PracticeError::NothingRecorded);
        };

        let audio_bytes = match tokio::fs::read(&recording.file_path).await {
            Ok(bytes) => bytes,
            Err(error) => {
                tracing::error!(%error, path = %recording.file_path.display(), "could not read recording");
                return Err(PracticeError::Failed);
            }
        };
        let file_name = recording
            .file_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("recording.wav")
            .to_string();

        let response = match self
            .api
            .analyze_intonation(&file_name, audio_bytes, level.server_phrase_id)
            .await
        {
            Ok(response) => response,
            Err(error) => {
                return Err(if error.status_code() == Some(400) {
                    tracing::info!(level_id = level.id, "server reported a phrase mismatch");
                    PracticeError::PhraseMismatch
                } else {
                    tracing::warn!(%error, level_id = level.id, "analysis failed");
                    PracticeError::Failed
                });
            }
        };

        let score = ((response.score * 100.0).floor() / 100.0) as f32;
        let passed = score >= PASS_THRESHOLD;
        if passed {
            if let Err(error) = self.ledger.mark_passed(level.id).await {
                tracing::warn!(%error, level_id = level.id, "could not persist passed level");
            }
        }
        tracing::info!(level_id = level.id, score, passed, "analysis complete");

        Ok(PracticeOutcome {
            level_id: level.id.to_string(),
            score,
            passed,
            feedback: format!("Your score: {score:.2}"),
            graph_url: response.graph_url,
            details: response.details,
            expected_phrase: response.expected_phrase,
            recording,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ApiError, MockIntonationApi};
    use crate::audio::MockAudioBackend;
    use crate::catalog;
    use intona_api::AnalyzeResponse;

    fn analyze_response(score: f64) -> AnalyzeResponse {
        AnalyzeResponse {
            phrase_probability: 0.95,
            score,
            graph_url: "https://server/graphs/1.png".into(),
            details: AnalysisDetails {
                f0_similarity: 0.9,
                energy_similarity: 0.8,
                contour_similarity: 0.85,
                best_match_score: score,
                score_variance: 1.0,
                ik_type: "ik1".into(),
                best_reference_index: 0,
                all_scores: vec![score],
            },
            expected_phrase: None,
        }
    }

    fn level() -> &'static catalog::Level {
        catalog::level_by_id("ik1", "ik1_level1").unwrap().1
    }

    fn recording_backend() -> MockAudioBackend {
        let mut backend = MockAudioBackend::new();
        backend.expect_start_capture().returning(|_| Ok(()));
        backend.expect_finish_capture().returning(|| Ok(()));
        backend
    }

    /// Records through the manager and puts real bytes at the artifact path
    /// so the upload step has something to read.
    async fn record_attempt<A: IntonationApi>(orchestrator: &PracticeOrchestrator<A, MockAudioBackend>) {
        orchestrator.start_recording().await.unwrap();
        let artifact = orchestrator.stop_recording().await.unwrap();
        tokio::fs::write(&artifact.file_path, b"RIFF-fake-wav").await.unwrap();
    }

    fn make_orchestrator(
        api: MockIntonationApi,
        dir: &tempfile::TempDir,
    ) -> PracticeOrchestrator<MockIntonationApi, MockAudioBackend> {
        let audio = AudioSessionManager::new(recording_backend(), dir.path().join("recordings"));
        let ledger = ProgressLedger::new(dir.path());
        PracticeOrchestrator::new(api, audio, ledger)
    }

    #[tokio::test]
    async fn score_is_floored_not_rounded() {
        let mut api = MockIntonationApi::new();
        api.expect_analyze_intonation()
            .withf(|_, bytes, phrase| !bytes.is_empty() && phrase == "Its_my_house")
            .returning(|_, _, _| Ok(analyze_response(79.996)));

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = make_orchestrator(api, &dir);
        record_attempt(&orchestrator).await;

        let outcome = orchestrator.analyze(level()).await.unwrap();
        assert_eq!(outcome.score, 79.99);
        assert!(!outcome.passed);
        assert!(!orchestrator.ledger().is_passed("ik1_level1").await);
    }

    #[tokio::test]
    async fn exactly_eighty_passes_and_is_recorded_in_the_ledger() {
        let mut api = MockIntonationApi::new();
        api.expect_analyze_intonation()
            .returning(|_, _, _| Ok(analyze_response(80.0)));

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = make_orchestrator(api, &dir);
        record_attempt(&orchestrator).await;

        let outcome = orchestrator.analyze(level()).await.unwrap();
        assert_eq!(outcome.score, 80.0);
        assert!(outcome.passed);
        assert_eq!(outcome.feedback, "Your score: 80.00");
        assert!(orchestrator.ledger().is_passed("ik1_level1").await);
    }

    #[tokio::test]
    async fn just_below_the_threshold_does_not_pass() {
        let mut api = MockIntonationApi::new();
        api.expect_analyze_intonation()
            .returning(|_, _, _| Ok(analyze_response(79.99)));

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = make_orchestrator(api, &dir);
        record_attempt(&orchestrator).await;

        let outcome = orchestrator.analyze(level()).await.unwrap();
        assert!(!outcome.passed);
        assert!(!orchestrator.ledger().is_passed("ik1_level1").await);
    }

    #[tokio::test]
    async fn http_400_is_a_phrase_mismatch_and_500_is_generic() {
        for (code, expected) in [(400, PracticeError::PhraseMismatch), (500, PracticeError::Failed)]
        {
            let mut api = MockIntonationApi::new();
            api.expect_analyze_intonation().returning(move |_, _, _| {
                Err(ApiError::Status {
                    code,
                    message: "rejected".into(),
                })
            });

            let dir = tempfile::tempdir().unwrap();
            let orchestrator = make_orchestrator(api, &dir);
            record_attempt(&orchestrator).await;

            assert_eq!(orchestrator.analyze(level()).await.unwrap_err(), expected);
        }
    }

    #[tokio::test]
    async fn analyze_without_a_recording_is_rejected() {
        let api = MockIntonationApi::new();
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = make_orchestrator(api, &dir);

        assert_eq!(
            orchestrator.analyze(level()).await.unwrap_err(),
            PracticeError::NothingRecorded
        );
    }

    #[tokio::test]
    async fn a_recording_is_consumed_by_exactly_one_analysis() {
        let mut api = MockIntonationApi::new();
        api.expect_analyze_intonation()
            .times(1)
            .returning(|_, _, _| Ok(analyze_response(85.0)));

        let dir = tempfile::tempdir().unwrap();
        let orchestrator = make_orchestrator(api, &dir);
        record_attempt(&orchestrator).await;

        let outcome = orchestrator.analyze(level()).await.unwrap();
        assert!(outcome.recording.file_path.exists());
        assert_eq!(
            orchestrator.analyze(level()).await.unwrap_err(),
            PracticeError::NothingRecorded
        );
    }
}
