use std::ffi::OsString;
use std::path::Path;
use std::process::Command;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::audio::{probe_duration, TempoPlan};
use crate::error::{Result, RevoiceError};

use super::MediaEngine;

/// [`MediaEngine`] backed by the `ffmpeg` and `ffprobe` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: String,
    ffprobe: String,
}

impl Default for FfmpegEngine {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

impl FfmpegEngine {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    /// Check that both FFmpeg and FFprobe are installed and accessible.
    pub fn check_available(&self) -> Result<()> {
        check_tool(&self.ffmpeg)?;
        check_tool(&self.ffprobe)?;
        debug!("FFmpeg and FFprobe are available");
        Ok(())
    }

    /// Arguments for the tempo stretch; the plan becomes one `-filter:a` chain.
    pub fn stretch_args(audio_in: &Path, plan: &TempoPlan, audio_out: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            audio_in.into(),
            "-filter:a".into(),
            plan.filter_chain().into(),
            audio_out.into(),
        ]
    }

    /// Arguments for the remux: copy video stream 0, take audio from input 1.
    pub fn remux_args(video_in: &Path, audio_in: &Path, video_out: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            video_in.into(),
            "-i".into(),
            audio_in.into(),
            "-c:v".into(),
            "copy".into(),
            "-map".into(),
            "0:v:0".into(),
            "-map".into(),
            "1:a:0".into(),
            video_out.into(),
        ]
    }

    /// Arguments for mono PCM extraction suited to speech recognition.
    pub fn extract_mono_args(input: &Path, audio_out: &Path) -> Vec<OsString> {
        vec![
            "-y".into(),
            "-i".into(),
            input.into(),
            "-vn".into(),
            "-acodec".into(),
            "pcm_s16le".into(),
            "-ar".into(),
            "16000".into(),
            "-ac".into(),
            "1".into(),
            audio_out.into(),
        ]
    }

    /// Run FFmpeg after checking every declared input exists.
    ///
    /// Nothing is spawned when an input is missing.
    fn run(&self, inputs: &[&Path], args: Vec<OsString>) -> Result<()> {
        for input in inputs {
            if !input.is_file() {
                return Err(RevoiceError::AssetNotFound(input.to_path_buf()));
            }
        }

        debug!("Executing {} {:?}", self.ffmpeg, args);

        let output = Command::new(&self.ffmpeg)
            .args(&args)
            .output()
            .map_err(|e| RevoiceError::ExternalTool {
                tool: self.ffmpeg.clone(),
                code: None,
                stderr: format!("Failed to run FFmpeg: {e}"),
            })?;

        if !output.status.success() {
            return Err(RevoiceError::ExternalTool {
                tool: self.ffmpeg.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }
}

fn check_tool(binary: &str) -> Result<()> {
    let output = Command::new(binary)
        .arg("-version")
        .output()
        .map_err(|e| RevoiceError::ExternalTool {
            tool: binary.to_string(),
            code: None,
            stderr: format!(
                "{binary} not found. Please install FFmpeg and ensure it's in your PATH. Error: {e}"
            ),
        })?;

    if !output.status.success() {
        return Err(RevoiceError::ExternalTool {
            tool: binary.to_string(),
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(())
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn extract_mono(&self, input: &Path, audio_out: &Path) -> Result<()> {
        self.run(&[input], Self::extract_mono_args(input, audio_out))?;
        info!("Mono audio extracted to {}", audio_out.display());
        Ok(())
    }

    async fn stretch(&self, audio_in: &Path, plan: &TempoPlan, audio_out: &Path) -> Result<()> {
        self.run(&[audio_in], Self::stretch_args(audio_in, plan, audio_out))?;
        info!(
            "Aligned audio saved to {} ({})",
            audio_out.display(),
            plan.filter_chain()
        );
        Ok(())
    }

    async fn remux(&self, video_in: &Path, audio_in: &Path, video_out: &Path) -> Result<()> {
        self.run(
            &[video_in, audio_in],
            Self::remux_args(video_in, audio_in, video_out),
        )?;
        info!(
            "New video with corrected audio saved to {}",
            video_out.display()
        );
        Ok(())
    }

    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        probe_duration(&self.ffprobe, path)
    }

    fn name(&self) -> &'static str {
        "FFmpeg"
    }
}
