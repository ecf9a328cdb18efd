//! Per-session state and scratch space.

use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;

use crate::correct::Correction;
use crate::error::{Result, RevoiceError};

/// Accepted input containers, checked by extension only.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi"];

/// File name offered when the final video is exported.
pub const DOWNLOAD_FILE_NAME: &str = "SynchronizedAI_Video.mp4";

/// Where a session is in the pipeline. Each variant carries the results
/// produced so far.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Transcribed {
        transcript: String,
    },
    Corrected {
        transcript: String,
        correction: Correction,
    },
    Finalized {
        transcript: String,
        correction: Correction,
        final_video: PathBuf,
    },
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Transcribed { .. } => "transcribed",
            SessionState::Corrected { .. } => "corrected",
            SessionState::Finalized { .. } => "finalized",
        }
    }

    pub fn transcript(&self) -> Option<&str> {
        match self {
            SessionState::Idle => None,
            SessionState::Transcribed { transcript }
            | SessionState::Corrected { transcript, .. }
            | SessionState::Finalized { transcript, .. } => Some(transcript),
        }
    }

    pub fn correction(&self) -> Option<&Correction> {
        match self {
            SessionState::Corrected { correction, .. }
            | SessionState::Finalized { correction, .. } => Some(correction),
            _ => None,
        }
    }

    pub fn final_video(&self) -> Option<&Path> {
        match self {
            SessionState::Finalized { final_video, .. } => Some(final_video),
            _ => None,
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Scratch directory owned by one session, deleted when the session ends.
pub struct SessionWorkspace {
    dir: TempDir,
}

impl SessionWorkspace {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("revoice-").tempdir()?;
        debug!("Using session workspace: {:?}", dir.path());
        Ok(Self { dir })
    }

    /// Unique identifier of the owning session.
    pub fn id(&self) -> String {
        self.dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn mono_audio(&self) -> PathBuf {
        self.dir.path().join("mono_audio.wav")
    }

    pub fn corrected_audio(&self) -> PathBuf {
        self.dir.path().join("corrected_audio.wav")
    }

    pub fn aligned_audio(&self) -> PathBuf {
        self.dir.path().join("aligned_audio.wav")
    }

    pub fn final_video(&self) -> PathBuf {
        self.dir.path().join("final_video.mp4")
    }

    /// Remove the outputs of a previous finalize run.
    pub fn clear_outputs(&self) -> Result<()> {
        for path in [self.corrected_audio(), self.aligned_audio(), self.final_video()] {
            match std::fs::remove_file(&path) {
                Ok(()) => debug!("Removed stale {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl Drop for SessionWorkspace {
    fn drop(&mut self) {
        // TempDir deletes itself on drop
        debug!("Cleaning up session workspace: {:?}", self.dir.path());
    }
}

/// Check that `path` exists and looks like a supported video by extension.
pub fn validate_input(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(RevoiceError::AssetNotFound(path.to_path_buf()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(RevoiceError::UnsupportedInput(format!(
            "{} (expected one of: {})",
            path.display(),
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    Ok(())
}

/// Whether `a` and `b` resolve to the same existing file.
fn same_file(a: &Path, b: &Path) -> Result<bool> {
    if !a.exists() || !b.exists() {
        return Ok(false);
    }
    Ok(a.canonicalize()? == b.canonicalize()?)
}

/// One user's run through the pipeline.
pub struct Session {
    input: PathBuf,
    state: SessionState,
    workspace: SessionWorkspace,
}

impl Session {
    pub fn new(input: impl Into<PathBuf>) -> Result<Self> {
        let input = input.into();
        validate_input(&input)?;

        Ok(Self {
            input,
            state: SessionState::Idle,
            workspace: SessionWorkspace::new()?,
        })
    }

    pub fn id(&self) -> String {
        self.workspace.id()
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn workspace(&self) -> &SessionWorkspace {
        &self.workspace
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        debug!("Session {}: {} -> {}", self.id(), self.state, state);
        self.state = state;
    }

    /// Copy the final video to `dest`. A directory destination gets
    /// [`DOWNLOAD_FILE_NAME`].
    pub fn export_final(&self, dest: &Path) -> Result<PathBuf> {
        let final_video = self.state.final_video().ok_or(RevoiceError::InvalidTransition {
            action: "export",
            state: self.state.name(),
        })?;

        let target = if dest.is_dir() {
            dest.join(DOWNLOAD_FILE_NAME)
        } else {
            dest.to_path_buf()
        };

        if same_file(&target, &self.input)? {
            return Err(RevoiceError::ExportCollision(target));
        }

        std::fs::copy(final_video, &target)?;
        Ok(target)
    }
}
