//! Media engine capability.
//!
//! Orchestration only talks to [`MediaEngine`], so FFmpeg can be swapped for
//! another tool or mocked in tests.

pub mod ffmpeg;

use async_trait::async_trait;
use std::path::Path;

use crate::audio::TempoPlan;
use crate::error::Result;

pub use ffmpeg::FfmpegEngine;

#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Decode the audio track of `input` into mono 16-bit PCM WAV.
    async fn extract_mono(&self, input: &Path, audio_out: &Path) -> Result<()>;

    /// Apply every factor of `plan`, in order, as one chained tempo filter.
    async fn stretch(&self, audio_in: &Path, plan: &TempoPlan, audio_out: &Path) -> Result<()>;

    /// Write `video_out` with the visual stream of `video_in` and the audio of `audio_in`.
    async fn remux(&self, video_in: &Path, audio_in: &Path, video_out: &Path) -> Result<()>;

    /// Playback duration in seconds.
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    fn name(&self) -> &'static str;
}
