pub mod google;

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Result, RevoiceError};
use crate::media::MediaEngine;

pub use google::GoogleSpeechClient;

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Recognize speech in a mono WAV file, returning segments in emission order.
    async fn recognize(&self, audio: &Path) -> Result<Vec<String>>;
    fn name(&self) -> &'static str;
}

/// Join recognized segments into one transcript.
pub fn join_segments<S: AsRef<str>>(segments: &[S]) -> String {
    segments
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Transcribe the audio track of `video`.
///
/// The mono intermediate at `mono_path` is removed once recognized. An empty
/// transcript is reported as a failure.
pub async fn transcribe_video(
    media: &dyn MediaEngine,
    speech: &dyn SpeechToText,
    video: &Path,
    mono_path: &Path,
) -> Result<String> {
    info!("Extracting mono audio from {}", video.display());
    media.extract_mono(video, mono_path).await?;

    let recognized = speech.recognize(mono_path).await;

    if let Err(e) = tokio::fs::remove_file(mono_path).await {
        warn!("Failed to remove {}: {}", mono_path.display(), e);
    }

    let segments = recognized?;
    debug!("{} returned {} segment(s)", speech.name(), segments.len());

    let transcript = join_segments(&segments);
    if transcript.trim().is_empty() {
        return Err(RevoiceError::Transcription(
            "no speech was recognized".to_string(),
        ));
    }

    Ok(transcript)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_segments_with_single_spaces() {
        assert_eq!(
            join_segments(&["hello world", "how is you", "today"]),
            "hello world how is you today"
        );
        assert_eq!(join_segments::<&str>(&[]), "");
        assert_eq!(join_segments(&["only"]), "only");
    }
}
