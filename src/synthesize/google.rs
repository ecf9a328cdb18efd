use crate::auth::GoogleAuth;
use crate::error::{Result, RevoiceError};
use crate::synthesize::Synthesizer;
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, info};

/// Google Cloud Text-to-Speech endpoint.
const SYNTHESIZE_URL: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Google Cloud Text-to-Speech client producing LINEAR16 WAV audio.
pub struct GoogleTtsClient {
    client: reqwest::Client,
    auth: Arc<GoogleAuth>,
    endpoint: String,
    language: String,
    voice: String,
}

impl GoogleTtsClient {
    pub fn new(auth: Arc<GoogleAuth>) -> Self {
        Self {
            client: reqwest::Client::new(),
            auth,
            endpoint: SYNTHESIZE_URL.to_string(),
            language: "en-US".to_string(),
            voice: "en-US-Wavenet-C".to_string(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the voice name, e.g. "en-US-Wavenet-C".
    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn build_request<'a>(&'a self, text: &'a str) -> SynthesizeRequest<'a> {
        SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &self.language,
                name: &self.voice,
            },
            audio_config: AudioConfig {
                audio_encoding: "LINEAR16",
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: String,
}

#[async_trait]
impl Synthesizer for GoogleTtsClient {
    async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        debug!("Synthesizing {} chars with {}", text.len(), self.voice);

        let request = self
            .auth
            .authorize(self.client.post(&self.endpoint).json(&self.build_request(text)))
            .await?;
        let response = request.send().await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(RevoiceError::ExternalService {
                service: "Google Text-to-Speech",
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SynthesizeResponse = serde_json::from_str(&body)?;
        let audio = base64::engine::general_purpose::STANDARD
            .decode(parsed.audio_content.as_bytes())
            .map_err(|e| RevoiceError::Decode {
                path: output.to_path_buf(),
                reason: format!("audioContent is not valid base64: {e}"),
            })?;

        fs::write(output, &audio).await?;
        info!("Corrected audio saved to {}", output.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "Google Text-to-Speech"
    }
}
