use std::fmt;
use std::path::PathBuf;

/// Result type used by the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Everything that can go wrong while fetching or converting.
///
/// `Setup` and `ToolNotFound` abort a run before any item is touched. The
/// remaining variants are per-item: fatal in single mode, logged and skipped
/// in batch mode.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Bad CLI input or an unusable output directory.
    #[error("{0}")]
    Setup(String),

    #[error(transparent)]
    ToolNotFound(#[from] ToolNotFound),

    /// The source exposes no audio-capable variant.
    #[error("no audio formats found for {url}")]
    NoAudioFormat { url: String },

    /// Network or storage failure while downloading.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The transcoder could not be started or exited non-zero.
    #[error("conversion of {} failed: {reason}", .input.display())]
    Conversion { input: PathBuf, reason: String },
}

impl PipelineError {
    pub(crate) fn fetch(url: &str, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The transcoder could not be found in any of the searched locations.
///
/// Kept separate from [`PipelineError`] so the locator can cache it and hand
/// out copies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{tool} not found: place {binary} next to the executable (or in its vendor/ directory) \
     or install {tool} on PATH"
)]
pub struct ToolNotFound {
    pub tool: String,
    pub binary: String,
}
