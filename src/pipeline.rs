use crate::audio::{plan_tempo, TempoPlan};
use crate::auth::{CredentialSource, GoogleAuth};
use crate::config::{Config, CorrectionErrorPolicy};
use crate::correct::{AzureOpenAiCorrector, Correction, Corrector};
use crate::error::{Result, RevoiceError};
use crate::media::{FfmpegEngine, MediaEngine};
use crate::session::{Session, SessionState};
use crate::synthesize::{GoogleTtsClient, Synthesizer};
use crate::transcribe::{transcribe_video, GoogleSpeechClient, SpeechToText};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Configuration for the correction pipeline.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    /// How a language-model error is handled.
    pub correction_error_policy: CorrectionErrorPolicy,
}

/// What the finalize step produced.
#[derive(Debug, Clone)]
pub struct FinalizeReport {
    pub final_video: PathBuf,
    pub original_duration: f64,
    pub corrected_duration: f64,
    pub plan: TempoPlan,
    pub elapsed: Duration,
}

/// Drives a [`Session`] through transcribe, correct and finalize.
///
/// Every step only runs once its predecessor's result is stored in the
/// session. A failed step leaves the session untouched so it can be retried.
pub struct Pipeline {
    media: Box<dyn MediaEngine>,
    speech: Box<dyn SpeechToText>,
    corrector: Box<dyn Corrector>,
    synthesizer: Box<dyn Synthesizer>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        media: Box<dyn MediaEngine>,
        speech: Box<dyn SpeechToText>,
        corrector: Box<dyn Corrector>,
        synthesizer: Box<dyn Synthesizer>,
    ) -> Self {
        Self {
            media,
            speech,
            corrector,
            synthesizer,
            config: PipelineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Build the production pipeline: FFmpeg, Google Speech/TTS and Azure OpenAI.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let engine = FfmpegEngine::new(&config.ffmpeg_path, &config.ffprobe_path);
        engine.check_available()?;

        let source = CredentialSource::from_env(config.google_api_key.as_deref())?;
        let auth = Arc::new(GoogleAuth::from_source(source)?);

        let api_key = config.azure_openai_key.clone().ok_or_else(|| {
            RevoiceError::Config("Azure OpenAI key not set. Set AZURE_OPENAI_KEY.".to_string())
        })?;
        let endpoint = config.azure_openai_endpoint.clone().ok_or_else(|| {
            RevoiceError::Config(
                "Azure OpenAI endpoint not set. Set AZURE_OPENAI_ENDPOINT.".to_string(),
            )
        })?;

        debug!(
            "Using {} with correction error policy {}",
            engine.name(),
            config.correction_error_policy
        );

        let speech = GoogleSpeechClient::new(auth.clone()).with_language(&config.language);
        let corrector =
            AzureOpenAiCorrector::new(api_key, endpoint).with_max_tokens(config.max_tokens);
        let synthesizer = GoogleTtsClient::new(auth)
            .with_language(&config.language)
            .with_voice(&config.voice);

        Ok(Self::new(
            Box::new(engine),
            Box::new(speech),
            Box::new(corrector),
            Box::new(synthesizer),
        )
        .with_config(PipelineConfig {
            correction_error_policy: config.correction_error_policy,
        }))
    }

    /// Transcribe the session's video. Re-running discards later results.
    pub async fn transcribe(&self, session: &mut Session) -> Result<String> {
        info!("Transcribing audio with {}", self.speech.name());
        let start = Instant::now();

        let mono_path = session.workspace().mono_audio();
        let transcript = transcribe_video(
            self.media.as_ref(),
            self.speech.as_ref(),
            session.input(),
            &mono_path,
        )
        .await?;

        info!(
            "Transcription complete: {} chars in {:.2}s",
            transcript.len(),
            start.elapsed().as_secs_f64()
        );

        session.set_state(SessionState::Transcribed {
            transcript: transcript.clone(),
        });
        Ok(transcript)
    }

    /// Correct the stored transcript.
    ///
    /// With [`CorrectionErrorPolicy::PassThrough`] a service error is stored as
    /// the correction and the session still advances.
    pub async fn correct(&self, session: &mut Session) -> Result<Correction> {
        let transcript = session
            .state()
            .transcript()
            .ok_or(RevoiceError::InvalidTransition {
                action: "correct",
                state: session.state().name(),
            })?
            .to_string();

        info!("Correcting transcription with {}", self.corrector.name());
        let correction = self.corrector.correct(&transcript).await?;

        if let Correction::Corrected(text) = &correction {
            if text.trim().is_empty() {
                return Err(RevoiceError::Correction(format!(
                    "{} returned an empty correction",
                    self.corrector.name()
                )));
            }
        }

        if let Correction::ServiceError { status, body } = &correction {
            match self.config.correction_error_policy {
                CorrectionErrorPolicy::Halt => {
                    return Err(RevoiceError::ExternalService {
                        service: self.corrector.name(),
                        status: *status,
                        body: body.clone(),
                    });
                }
                CorrectionErrorPolicy::PassThrough => {
                    warn!(
                        "{} returned {}; its error text will be synthesized",
                        self.corrector.name(),
                        status
                    );
                }
            }
        }

        session.set_state(SessionState::Corrected {
            transcript,
            correction: correction.clone(),
        });
        Ok(correction)
    }

    /// Synthesize, align and remux the corrected speech into a new video.
    ///
    /// Outputs of a previous run are deleted first and a finalized session
    /// drops back to corrected, so a failed re-run never points at stale files.
    pub async fn finalize(&self, session: &mut Session) -> Result<FinalizeReport> {
        let (transcript, correction) = match session.state() {
            SessionState::Corrected {
                transcript,
                correction,
            }
            | SessionState::Finalized {
                transcript,
                correction,
                ..
            } => (transcript.clone(), correction.clone()),
            other => {
                return Err(RevoiceError::InvalidTransition {
                    action: "finalize",
                    state: other.name(),
                })
            }
        };

        // The previous final video is about to be deleted.
        if session.state().final_video().is_some() {
            session.set_state(SessionState::Corrected {
                transcript: transcript.clone(),
                correction: correction.clone(),
            });
        }

        let start = Instant::now();
        let workspace = session.workspace();
        workspace.clear_outputs()?;

        let corrected_audio = workspace.corrected_audio();
        let aligned_audio = workspace.aligned_audio();
        let final_video = workspace.final_video();

        info!("Step 1/4: Generating corrected audio with {}", self.synthesizer.name());
        self.synthesizer
            .synthesize(&correction.text(), &corrected_audio)
            .await?;

        info!("Step 2/4: Measuring durations");
        let original_duration = self.media.probe_duration(session.input()).await?;
        let corrected_duration = self.media.probe_duration(&corrected_audio).await?;

        info!(
            "Step 3/4: Aligning {:.2}s of speech to {:.2}s with {}",
            corrected_duration,
            original_duration,
            self.media.name()
        );
        let plan = plan_tempo(original_duration, corrected_duration)?;
        self.media
            .stretch(&corrected_audio, &plan, &aligned_audio)
            .await?;

        info!("Step 4/4: Replacing audio in video");
        self.media
            .remux(session.input(), &aligned_audio, &final_video)
            .await?;

        let elapsed = start.elapsed();
        info!(
            "Final video ready at {} ({:.2}s)",
            final_video.display(),
            elapsed.as_secs_f64()
        );

        session.set_state(SessionState::Finalized {
            transcript,
            correction,
            final_video: final_video.clone(),
        });

        Ok(FinalizeReport {
            final_video,
            original_duration,
            corrected_duration,
            plan,
            elapsed,
        })
    }

    /// Run every remaining step in order.
    pub async fn run_all(&self, session: &mut Session) -> Result<FinalizeReport> {
        if session.state().transcript().is_none() {
            self.transcribe(session).await?;
        }
        if session.state().correction().is_none() {
            self.correct(session).await?;
        }
        self.finalize(session).await
    }
}

/// Print a summary of a finished session.
pub fn print_summary(session: &Session, report: &FinalizeReport) {
    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                    Audio Correction Complete                   ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    if let Some(transcript) = session.state().transcript() {
        println!("  Original:   {}", transcript);
    }
    if let Some(correction) = session.state().correction() {
        println!("  Corrected:  {}", correction);
    }
    println!();
    println!("  Video:      {:.2}s", report.original_duration);
    println!("  Speech:     {:.2}s", report.corrected_duration);
    println!("  Tempo:      {}", report.plan.filter_chain());
    println!("  Took:       {:.2}s", report.elapsed.as_secs_f64());
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}
