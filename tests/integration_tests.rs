//! Integration tests for the revoice pipeline
//!
//! The orchestrator is driven end to end with in-memory stand-ins for the
//! media engine and the three remote services, so no API keys or FFmpeg are
//! needed.

use async_trait::async_trait;
use revoice::audio::TempoPlan;
use revoice::config::CorrectionErrorPolicy;
use revoice::correct::{Correction, Corrector};
use revoice::media::MediaEngine;
use revoice::synthesize::Synthesizer;
use revoice::transcribe::SpeechToText;
use revoice::{Pipeline, PipelineConfig, RevoiceError, Session, SessionState};

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

const VIDEO_DURATION: f64 = 10.0;

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Clone, Default)]
struct MediaLog {
    plans: Arc<Mutex<Vec<String>>>,
    fail_remux: Arc<AtomicBool>,
    fail_stretch: Arc<AtomicBool>,
}

/// Copies bytes around instead of transcoding. Synthesized audio "lasts" one
/// second per byte.
struct FakeMedia {
    video: PathBuf,
    log: MediaLog,
}

fn require(path: &Path) -> revoice::Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(RevoiceError::AssetNotFound(path.to_path_buf()))
    }
}

fn tool_failure() -> RevoiceError {
    RevoiceError::ExternalTool {
        tool: "ffmpeg".to_string(),
        code: Some(1),
        stderr: "Conversion failed!".to_string(),
    }
}

#[async_trait]
impl MediaEngine for FakeMedia {
    async fn extract_mono(&self, input: &Path, audio_out: &Path) -> revoice::Result<()> {
        require(input)?;
        std::fs::write(audio_out, b"mono")?;
        Ok(())
    }

    async fn stretch(
        &self,
        audio_in: &Path,
        plan: &TempoPlan,
        audio_out: &Path,
    ) -> revoice::Result<()> {
        require(audio_in)?;
        if self.log.fail_stretch.load(Ordering::SeqCst) {
            return Err(tool_failure());
        }
        self.log.plans.lock().unwrap().push(plan.filter_chain());
        std::fs::copy(audio_in, audio_out)?;
        Ok(())
    }

    async fn remux(
        &self,
        video_in: &Path,
        audio_in: &Path,
        video_out: &Path,
    ) -> revoice::Result<()> {
        require(video_in)?;
        require(audio_in)?;
        if self.log.fail_remux.load(Ordering::SeqCst) {
            return Err(tool_failure());
        }
        let mut contents = std::fs::read(video_in)?;
        contents.push(b'|');
        contents.extend(std::fs::read(audio_in)?);
        std::fs::write(video_out, contents)?;
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> revoice::Result<f64> {
        require(path)?;
        if path == self.video {
            Ok(VIDEO_DURATION)
        } else {
            Ok(std::fs::metadata(path)?.len() as f64)
        }
    }

    fn name(&self) -> &'static str {
        "fake media"
    }
}

struct FakeSpeech {
    responses: Mutex<VecDeque<revoice::Result<Vec<String>>>>,
}

#[async_trait]
impl SpeechToText for FakeSpeech {
    async fn recognize(&self, audio: &Path) -> revoice::Result<Vec<String>> {
        require(audio)?;
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec!["me and him goes".to_string()]))
    }

    fn name(&self) -> &'static str {
        "fake speech"
    }
}

struct FakeCorrector {
    responses: Mutex<VecDeque<Correction>>,
}

#[async_trait]
impl Corrector for FakeCorrector {
    async fn correct(&self, transcript: &str) -> revoice::Result<Correction> {
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Correction::Corrected(format!("corrected: {transcript}"))))
    }

    fn name(&self) -> &'static str {
        "fake corrector"
    }
}

struct FakeSynth {
    received: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Synthesizer for FakeSynth {
    async fn synthesize(&self, text: &str, output: &Path) -> revoice::Result<()> {
        self.received.lock().unwrap().push(text.to_string());
        std::fs::write(output, text.as_bytes())?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake synth"
    }
}

struct Harness {
    _dir: TempDir,
    video: PathBuf,
    media: MediaLog,
    synthesized: Arc<Mutex<Vec<String>>>,
    pipeline: Pipeline,
}

fn harness(
    segments: Vec<revoice::Result<Vec<String>>>,
    corrections: Vec<Correction>,
    policy: CorrectionErrorPolicy,
) -> Harness {
    harness_with_video("uploaded_file.mp4", segments, corrections, policy)
}

fn harness_with_video(
    video_name: &str,
    segments: Vec<revoice::Result<Vec<String>>>,
    corrections: Vec<Correction>,
    policy: CorrectionErrorPolicy,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let video = dir.path().join(video_name);
    std::fs::write(&video, b"VIDEO").unwrap();

    let media = MediaLog::default();
    let synthesized = Arc::new(Mutex::new(Vec::new()));

    let pipeline = Pipeline::new(
        Box::new(FakeMedia {
            video: video.clone(),
            log: media.clone(),
        }),
        Box::new(FakeSpeech {
            responses: Mutex::new(segments.into()),
        }),
        Box::new(FakeCorrector {
            responses: Mutex::new(corrections.into()),
        }),
        Box::new(FakeSynth {
            received: synthesized.clone(),
        }),
    )
    .with_config(PipelineConfig {
        correction_error_policy: policy,
    });

    Harness {
        _dir: dir,
        video,
        media,
        synthesized,
        pipeline,
    }
}

fn default_harness() -> Harness {
    harness(vec![], vec![], CorrectionErrorPolicy::PassThrough)
}

// ============================================================================
// Happy path
// ============================================================================

mod happy_path_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_session_reaches_finalized() {
        let h = harness(
            vec![Ok(vec![
                "me and him goes".to_string(),
                "to the store".to_string(),
            ])],
            vec![Correction::Corrected("He and I go.".to_string())],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();
        assert_eq!(session.state(), &SessionState::Idle);

        let transcript = h.pipeline.transcribe(&mut session).await.unwrap();
        assert_eq!(transcript, "me and him goes to the store");
        assert_eq!(session.state().name(), "transcribed");
        assert!(!session.workspace().mono_audio().exists());

        let correction = h.pipeline.correct(&mut session).await.unwrap();
        assert_eq!(correction, Correction::Corrected("He and I go.".to_string()));
        assert_eq!(session.state().name(), "corrected");

        let report = h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(session.state().name(), "finalized");
        assert_eq!(session.state().final_video(), Some(report.final_video.as_path()));
        assert!(report.final_video.starts_with(session.workspace().path()));

        // "He and I go." is 12 bytes -> 12s of speech over a 10s clip.
        assert_eq!(report.original_duration, VIDEO_DURATION);
        assert_eq!(report.corrected_duration, 12.0);
        assert_eq!(report.plan.filter_chain(), "atempo=1.20");
        assert_eq!(*h.media.plans.lock().unwrap(), vec!["atempo=1.20"]);

        let contents = std::fs::read(&report.final_video).unwrap();
        assert_eq!(contents, b"VIDEO|He and I go.");
    }

    #[tokio::test]
    async fn test_long_speech_uses_chained_tempo() {
        let long = "x".repeat(50);
        let h = harness(
            vec![],
            vec![Correction::Corrected(long)],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();

        let report = h.pipeline.run_all(&mut session).await.unwrap();
        assert_eq!(report.plan.filter_chain(), "atempo=2.00,atempo=2.00,atempo=1.25");
        assert_eq!(report.plan.len(), 3);
    }

    #[tokio::test]
    async fn test_export_final_uses_download_name() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.run_all(&mut session).await.unwrap();

        let out_dir = TempDir::new().unwrap();
        let saved = session.export_final(out_dir.path()).unwrap();
        assert_eq!(saved, out_dir.path().join("SynchronizedAI_Video.mp4"));
        assert!(std::fs::read(&saved).unwrap().starts_with(b"VIDEO|"));

        let explicit = out_dir.path().join("custom.mp4");
        assert_eq!(session.export_final(&explicit).unwrap(), explicit);
    }

    #[tokio::test]
    async fn test_export_refuses_to_overwrite_input() {
        let h = harness_with_video(
            "SynchronizedAI_Video.mp4",
            vec![],
            vec![],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.run_all(&mut session).await.unwrap();

        let dir = h.video.parent().unwrap();
        let result = session.export_final(dir);
        assert!(matches!(result, Err(RevoiceError::ExportCollision(_))));
        assert_eq!(std::fs::read(&h.video).unwrap(), b"VIDEO");
    }

    #[tokio::test]
    async fn test_sessions_do_not_share_paths() {
        let h = default_harness();
        let mut first = Session::new(&h.video).unwrap();
        let mut second = Session::new(&h.video).unwrap();

        let a = h.pipeline.run_all(&mut first).await.unwrap();
        let b = h.pipeline.run_all(&mut second).await.unwrap();

        assert_ne!(a.final_video, b.final_video);
        assert_ne!(first.id(), second.id());
        assert!(a.final_video.exists() && b.final_video.exists());
    }
}

// ============================================================================
// State machine
// ============================================================================

mod transition_tests {
    use super::*;

    #[tokio::test]
    async fn test_steps_require_predecessor() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();

        let result = h.pipeline.correct(&mut session).await;
        assert!(matches!(
            result,
            Err(RevoiceError::InvalidTransition { action: "correct", state: "idle" })
        ));

        let result = h.pipeline.finalize(&mut session).await;
        assert!(matches!(
            result,
            Err(RevoiceError::InvalidTransition { action: "finalize", state: "idle" })
        ));

        h.pipeline.transcribe(&mut session).await.unwrap();
        let result = h.pipeline.finalize(&mut session).await;
        assert!(matches!(
            result,
            Err(RevoiceError::InvalidTransition { action: "finalize", state: "transcribed" })
        ));
        assert!(h.synthesized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_transcript_stays_idle() {
        let h = harness(
            vec![Ok(vec![]), Ok(vec!["   ".to_string()])],
            vec![],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();

        let result = h.pipeline.transcribe(&mut session).await;
        assert!(matches!(result, Err(RevoiceError::Transcription(_))));
        assert_eq!(session.state(), &SessionState::Idle);

        let result = h.pipeline.transcribe(&mut session).await;
        assert!(matches!(result, Err(RevoiceError::Transcription(_))));
        assert_eq!(session.state(), &SessionState::Idle);
        assert!(!session.workspace().mono_audio().exists());
    }

    #[tokio::test]
    async fn test_failed_transcription_is_retryable() {
        let h = harness(
            vec![Err(RevoiceError::ExternalService {
                service: "fake speech",
                status: 503,
                body: "unavailable".to_string(),
            })],
            vec![],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();

        assert!(h.pipeline.transcribe(&mut session).await.is_err());
        assert_eq!(session.state(), &SessionState::Idle);

        let transcript = h.pipeline.transcribe(&mut session).await.unwrap();
        assert_eq!(transcript, "me and him goes");
        assert_eq!(session.state().name(), "transcribed");
    }

    #[tokio::test]
    async fn test_empty_correction_stays_transcribed() {
        let h = harness(
            vec![],
            vec![
                Correction::Corrected(String::new()),
                Correction::Corrected(" \n\t".to_string()),
            ],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.transcribe(&mut session).await.unwrap();

        for _ in 0..2 {
            let result = h.pipeline.correct(&mut session).await;
            assert!(matches!(result, Err(RevoiceError::Correction(_))));
            assert_eq!(
                session.state(),
                &SessionState::Transcribed {
                    transcript: "me and him goes".to_string()
                }
            );
        }

        let result = h.pipeline.finalize(&mut session).await;
        assert!(matches!(
            result,
            Err(RevoiceError::InvalidTransition { action: "finalize", state: "transcribed" })
        ));
        assert!(h.synthesized.lock().unwrap().is_empty());

        // The queue is drained, so the next attempt gets a real correction.
        h.pipeline.correct(&mut session).await.unwrap();
        assert_eq!(session.state().name(), "corrected");
    }

    #[tokio::test]
    async fn test_retranscribe_discards_later_results() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.transcribe(&mut session).await.unwrap();
        h.pipeline.correct(&mut session).await.unwrap();

        h.pipeline.transcribe(&mut session).await.unwrap();
        assert_eq!(session.state().name(), "transcribed");
        assert!(session.state().correction().is_none());
    }
}

// ============================================================================
// Correction error policy
// ============================================================================

mod correction_policy_tests {
    use super::*;

    fn service_error() -> Correction {
        Correction::ServiceError {
            status: 401,
            body: "Access denied due to invalid subscription key.".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pass_through_error_reaches_synthesis_unchanged() {
        let h = harness(vec![], vec![service_error()], CorrectionErrorPolicy::PassThrough);
        let mut session = Session::new(&h.video).unwrap();

        h.pipeline.transcribe(&mut session).await.unwrap();
        let correction = h.pipeline.correct(&mut session).await.unwrap();
        assert!(correction.is_error());
        assert_eq!(session.state().name(), "corrected");

        h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(
            *h.synthesized.lock().unwrap(),
            vec!["Error:401-Access denied due to invalid subscription key.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_halt_policy_surfaces_service_error() {
        let h = harness(vec![], vec![service_error()], CorrectionErrorPolicy::Halt);
        let mut session = Session::new(&h.video).unwrap();

        h.pipeline.transcribe(&mut session).await.unwrap();
        let result = h.pipeline.correct(&mut session).await;

        match result {
            Err(RevoiceError::ExternalService { status, .. }) => assert_eq!(status, 401),
            other => panic!("Expected ExternalService, got: {other:?}"),
        }
        assert_eq!(session.state().name(), "transcribed");

        // The next attempt succeeds and advances.
        h.pipeline.correct(&mut session).await.unwrap();
        assert_eq!(session.state().name(), "corrected");
    }
}

// ============================================================================
// Finalize re-runs and failures
// ============================================================================

mod finalize_tests {
    use super::*;

    #[tokio::test]
    async fn test_finalize_twice_reflects_latest_inputs() {
        let h = harness(
            vec![],
            vec![
                Correction::Corrected("first take".to_string()),
                Correction::Corrected("second take".to_string()),
            ],
            CorrectionErrorPolicy::PassThrough,
        );
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.transcribe(&mut session).await.unwrap();
        h.pipeline.correct(&mut session).await.unwrap();

        let first = h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(std::fs::read(&first.final_video).unwrap(), b"VIDEO|first take");

        // Same inputs again: outputs are overwritten without error.
        let again = h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(again.final_video, first.final_video);
        assert_eq!(std::fs::read(&again.final_video).unwrap(), b"VIDEO|first take");

        h.pipeline.correct(&mut session).await.unwrap();
        let second = h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(second.final_video, first.final_video);
        assert_eq!(std::fs::read(&second.final_video).unwrap(), b"VIDEO|second take");
        assert_eq!(
            std::fs::read(session.workspace().aligned_audio()).unwrap(),
            b"second take"
        );
    }

    #[tokio::test]
    async fn test_remux_failure_stays_corrected_and_retries() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.transcribe(&mut session).await.unwrap();
        h.pipeline.correct(&mut session).await.unwrap();

        h.media.fail_remux.store(true, Ordering::SeqCst);
        let result = h.pipeline.finalize(&mut session).await;
        assert!(matches!(result, Err(RevoiceError::ExternalTool { code: Some(1), .. })));
        assert_eq!(session.state().name(), "corrected");

        h.media.fail_remux.store(false, Ordering::SeqCst);
        h.pipeline.finalize(&mut session).await.unwrap();
        assert_eq!(session.state().name(), "finalized");
    }

    #[tokio::test]
    async fn test_failed_rerun_leaves_no_stale_video() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();
        let report = h.pipeline.run_all(&mut session).await.unwrap();
        assert!(report.final_video.exists());

        h.media.fail_stretch.store(true, Ordering::SeqCst);
        assert!(h.pipeline.finalize(&mut session).await.is_err());

        assert_eq!(session.state().name(), "corrected");
        assert!(!report.final_video.exists());
        assert!(!session.workspace().aligned_audio().exists());
        assert!(session.export_final(&h.video.with_file_name("out.mp4")).is_err());
    }

    #[tokio::test]
    async fn test_missing_source_video_fails_finalize() {
        let h = default_harness();
        let mut session = Session::new(&h.video).unwrap();
        h.pipeline.transcribe(&mut session).await.unwrap();
        h.pipeline.correct(&mut session).await.unwrap();

        std::fs::remove_file(&h.video).unwrap();
        let result = h.pipeline.finalize(&mut session).await;
        assert!(matches!(result, Err(RevoiceError::AssetNotFound(_))));
        assert_eq!(session.state().name(), "corrected");
    }
}
