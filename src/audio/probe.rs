use std::path::Path;
use std::process::Command;

use hound::WavReader;
use tracing::debug;

use crate::error::{Result, RevoiceError};

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("wav"))
        .unwrap_or(false)
}

/// Get the playback duration of a media file in seconds.
///
/// WAV files are read directly from their header; anything else is probed
/// with FFprobe.
pub fn probe_duration(ffprobe: &str, path: &Path) -> Result<f64> {
    if !path.is_file() {
        return Err(RevoiceError::AssetNotFound(path.to_path_buf()));
    }

    let duration = if is_wav(path) {
        wav_duration(path)?
    } else {
        ffprobe_duration(ffprobe, path)?
    };

    debug!("Duration of {}: {:.3}s", path.display(), duration);
    Ok(duration)
}

/// Duration of a WAV file from its frame count and sample rate.
pub fn wav_duration(path: &Path) -> Result<f64> {
    let reader = WavReader::open(path).map_err(|e| match e {
        hound::Error::IoError(io) if io.kind() == std::io::ErrorKind::NotFound => {
            RevoiceError::AssetNotFound(path.to_path_buf())
        }
        other => RevoiceError::Decode {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;

    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(RevoiceError::Decode {
            path: path.to_path_buf(),
            reason: "sample rate is zero".to_string(),
        });
    }

    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// Duration reported by `ffprobe -show_entries format=duration`.
pub fn ffprobe_duration(ffprobe: &str, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .map_err(|e| RevoiceError::ExternalTool {
            tool: ffprobe.to_string(),
            code: None,
            stderr: format!("Failed to run FFprobe: {e}"),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(RevoiceError::Decode {
            path: path.to_path_buf(),
            reason: stderr.trim().to_string(),
        });
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str
        .trim()
        .parse::<f64>()
        .map_err(|e| RevoiceError::Decode {
            path: path.to_path_buf(),
            reason: format!("Failed to parse duration '{}': {e}", duration_str.trim()),
        })
}
