pub mod audio;
pub mod auth;
pub mod config;
pub mod correct;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod session;
pub mod synthesize;
pub mod transcribe;

pub use config::Config;
pub use error::{Result, RevoiceError};
pub use pipeline::{print_summary, FinalizeReport, Pipeline, PipelineConfig};
pub use session::{Session, SessionState};
