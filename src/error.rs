use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RevoiceError {
    #[error("Asset not found: {}", .0.display())]
    AssetNotFound(PathBuf),

    #[error("Failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("{tool} failed ({}): {stderr}", exit_label(.code))]
    ExternalTool {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{service} error ({status}): {body}")]
    ExternalService {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Transcription failed: {0}")]
    Transcription(String),

    #[error("Correction failed: {0}")]
    Correction(String),

    #[error("Refusing to overwrite the input video: {}", .0.display())]
    ExportCollision(PathBuf),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Cannot {action} while session is {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, RevoiceError>;
