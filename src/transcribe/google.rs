use crate::auth::GoogleAuth;
use crate::error::{Result, RevoiceError};
use crate::transcribe::SpeechToText;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::debug;

/// Google Cloud Speech-to-Text synchronous recognition endpoint.
const RECOGNIZE_URL: &str = "https://speech.googleapis.com/v1p1beta1/speech:recognize";

/// Google Cloud Speech-to-Text client.
pub struct GoogleSpeechClient {
    client: reqwest::Client,
    auth: Arc<GoogleAuth>,
    endpoint: String,
    language: String,
}

impl GoogleSpeechClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            endpoint: RECOGNIZE_URL.to_string(),
            language: "en-US".to_string(),
        }
    }

    /// Set the BCP-47 language tag, e.g. "en-US".
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request(&self, audio_bytes: &[u8]) -> RecognizeRequest {
        RecognizeRequest {
            config: RecognitionConfig {
                language_code: self.language.clone(),
            },
            audio: RecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio_bytes),
            },
        }
    }

    fn parse_response(response: RecognizeResponse) -> Vec<String> {
        response
            .results
            .into_iter()
            .filter_map(|r| r.alternatives.into_iter().next())
            .map(|a| a.transcript)
            .collect()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest {
    config: RecognitionConfig,
    audio: RecognitionAudio,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig {
    language_code: String,
}

#[derive(Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Deserialize, Debug, Default)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Deserialize, Debug)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<RecognitionAlternative>,
}

#[derive(Deserialize, Debug)]
struct RecognitionAlternative {
    #[serde(default)]
    transcript: String,
}

#[async_trait]
impl SpeechToText for GoogleSpeechClient {
    async fn recognize(&self, audio: &Path) -> Result<Vec<String>> {
        if !audio.is_file() {
            return Err(RevoiceError::AssetNotFound(audio.to_path_buf()));
        }

        let audio_bytes = fs::read(audio).await?;
        debug!(
            "Sending {} bytes of audio for recognition ({})",
            audio_bytes.len(),
            self.language
        );

        let request = self
            .auth
            .authorize(self.client.post(&self.endpoint).json(&self.build_request(&audio_bytes)))
            .await?;
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;
        debug!("Speech-to-Text response status: {}", status);

        if !status.is_success() {
            return Err(RevoiceError::ExternalService {
                service: "Google Speech-to-Text",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: RecognizeResponse = serde_json::from_str(&body)?;
        Ok(Self::parse_response(parsed))
    }

    fn name(&self) -> &'static str {
        "Google Speech-to-Text"
    }
}
