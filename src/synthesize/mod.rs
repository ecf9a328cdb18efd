pub mod google;

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;

pub use google::GoogleTtsClient;

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` and write the audio to `output`, replacing any existing file.
    async fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
    fn name(&self) -> &'static str;
}
