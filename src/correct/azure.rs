//! Grammar correction through an Azure OpenAI chat-completions deployment.

use crate::correct::{build_prompt, Correction, Corrector};
use crate::error::{Result, RevoiceError};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Corrector using an Azure OpenAI deployment.
pub struct AzureOpenAiCorrector {
    client: Client,
    api_key: String,
    endpoint: String,
    max_tokens: u32,
}

impl AzureOpenAiCorrector {
    /// `endpoint` is the full `.../chat/completions?api-version=...` URL.
    pub fn new(api_key: String, endpoint: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint,
            max_tokens: 150,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    fn build_request(&self, transcript: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: build_prompt(transcript),
            }],
            max_tokens: self.max_tokens,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize, Debug)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize, Debug)]
struct ChatChoice {
    message: ChatMessage,
}

#[async_trait]
impl Corrector for AzureOpenAiCorrector {
    async fn correct(&self, transcript: &str) -> Result<Correction> {
        debug!("Requesting correction of {} chars", transcript.len());

        let response = self
            .client
            .post(&self.endpoint)
            .header("api-key", &self.api_key)
            .json(&self.build_request(transcript))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!("Correction service returned {}", status);
            return Ok(Correction::ServiceError {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatResponse = serde_json::from_str(&body)?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RevoiceError::Json(serde::de::Error::custom("response has no choices")))?;

        Ok(Correction::Corrected(content.trim().to_string()))
    }

    fn name(&self) -> &'static str {
        "Azure OpenAI"
    }
}
