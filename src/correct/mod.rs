pub mod azure;

use async_trait::async_trait;

use crate::error::Result;

pub use azure::AzureOpenAiCorrector;

/// Instruction sent ahead of the transcript.
pub const CORRECTION_INSTRUCTION: &str = "Please correct the grammatical mistakes in the following text without changing the original meaning or context: ";

/// Outcome of a correction request.
///
/// A service error is a value, not an `Err`: the caller decides whether to
/// pass it downstream or stop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correction {
    Corrected(String),
    ServiceError { status: u16, body: String },
}

impl Correction {
    /// Text handed to synthesis. Service errors render as `Error:<code>-<body>`.
    pub fn text(&self) -> String {
        match self {
            Correction::Corrected(text) => text.clone(),
            Correction::ServiceError { status, body } => format!("Error:{status}-{body}"),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Correction::ServiceError { .. })
    }
}

impl std::fmt::Display for Correction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text())
    }
}

/// Build the full prompt for `transcript`.
pub fn build_prompt(transcript: &str) -> String {
    format!("{CORRECTION_INSTRUCTION}\n{transcript}")
}

#[async_trait]
pub trait Corrector: Send + Sync {
    /// Correct the grammar of `transcript`.
    ///
    /// Transport failures are `Err`; a non-success response from the model is
    /// `Ok(Correction::ServiceError { .. })`.
    async fn correct(&self, transcript: &str) -> Result<Correction>;
    fn name(&self) -> &'static str;
}
