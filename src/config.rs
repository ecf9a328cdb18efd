use crate::error::{Result, RevoiceError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// What to do when the language model reports an error instead of a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionErrorPolicy {
    /// Store the formatted error text as the correction and keep going.
    #[default]
    PassThrough,
    /// Surface the error and stay at the transcribed state.
    Halt,
}

impl std::fmt::Display for CorrectionErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorrectionErrorPolicy::PassThrough => write!(f, "passthrough"),
            CorrectionErrorPolicy::Halt => write!(f, "halt"),
        }
    }
}

impl std::str::FromStr for CorrectionErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "passthrough" | "pass-through" => Ok(CorrectionErrorPolicy::PassThrough),
            "halt" => Ok(CorrectionErrorPolicy::Halt),
            _ => Err(format!(
                "Unknown correction error policy: {}. Use 'passthrough' or 'halt'",
                s
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub azure_openai_key: Option<String>,
    pub azure_openai_endpoint: Option<String>,
    pub google_api_key: Option<String>,
    pub language: String,
    pub voice: String,
    pub max_tokens: u32,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub correction_error_policy: CorrectionErrorPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            azure_openai_key: None,
            azure_openai_endpoint: None,
            google_api_key: None,
            language: "en-US".to_string(),
            voice: "en-US-Wavenet-C".to_string(),
            max_tokens: 150,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            correction_error_policy: CorrectionErrorPolicy::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                config = toml::from_str::<Config>(&contents).map_err(|e| {
                    RevoiceError::Config(format!("{}: {e}", config_path.display()))
                })?;
            }
        }

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, so tests don't touch the real environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("AZURE_OPENAI_KEY") {
            self.azure_openai_key = Some(key);
        }
        if let Some(endpoint) = lookup("AZURE_OPENAI_ENDPOINT") {
            self.azure_openai_endpoint = Some(endpoint);
        }
        if let Some(key) = lookup("GOOGLE_API_KEY") {
            self.google_api_key = Some(key);
        }
        if let Some(language) = lookup("REVOICE_LANGUAGE") {
            self.language = language;
        }
        if let Some(voice) = lookup("REVOICE_VOICE") {
            self.voice = voice;
        }
        if let Some(max_tokens) = lookup("REVOICE_MAX_TOKENS") {
            match max_tokens.parse() {
                Ok(n) => self.max_tokens = n,
                Err(e) => warn!(
                    "Ignoring REVOICE_MAX_TOKENS={max_tokens:?} ({e}); keeping {}",
                    self.max_tokens
                ),
            }
        }
        if let Some(path) = lookup("REVOICE_FFMPEG") {
            self.ffmpeg_path = path;
        }
        if let Some(path) = lookup("REVOICE_FFPROBE") {
            self.ffprobe_path = path;
        }
        if let Some(policy) = lookup("REVOICE_CORRECTION_ERRORS") {
            match policy.parse() {
                Ok(p) => self.correction_error_policy = p,
                Err(e) => warn!(
                    "Ignoring REVOICE_CORRECTION_ERRORS: {e}; keeping {}",
                    self.correction_error_policy
                ),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.azure_openai_key.is_none() {
            return Err(RevoiceError::Config(
                "AZURE_OPENAI_KEY not set. Export it with: export AZURE_OPENAI_KEY=..."
                    .to_string(),
            ));
        }

        if self.azure_openai_endpoint.is_none() {
            return Err(RevoiceError::Config(
                "AZURE_OPENAI_ENDPOINT not set. Use the full chat/completions deployment URL"
                    .to_string(),
            ));
        }

        if self.max_tokens == 0 {
            return Err(RevoiceError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("revoice").join("config.toml"))
    }
}
