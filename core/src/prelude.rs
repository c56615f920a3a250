use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::archive::Archive;

/// Shared configuration for a combination run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fold in every readable input regardless of its effect on SNR.
    pub always_add: bool,
    /// Inputs whose SNR falls below this floor are excluded from ranking.
    pub min_snr: f64,
    /// Directory for rejection comparison artifacts. Defaults to the
    /// destination's directory when unset.
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            always_add: false,
            min_snr: 0.0,
            diagnostics_dir: None,
        }
    }
}

/// Common error type for combination runs.
#[derive(thiserror::Error, Debug)]
pub enum CombineError {
    #[error("no usable inputs remain after ranking")]
    InsufficientInput,
    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),
    #[error("unreadable archive {archive}: {reason}")]
    UnreadableArchive { archive: String, reason: String },
    #[error("alignment failed: {0}")]
    Alignment(String),
    #[error("incompatible archives: {0}")]
    Incompatible(String),
    #[error("diagnostic rendering failed: {0}")]
    Diagnostic(String),
    #[error("failed to commit combined archive: {0}")]
    Commit(String),
    #[error("internal failure: {0}")]
    Internal(String),
}

pub type CombineResult<T> = Result<T, CombineError>;

/// Trait describing the external archive-toolkit collaborators the engine
/// is written against.
pub trait ArchiveToolkit {
    /// Report the signal-to-noise ratio of an archive.
    fn snr(&self, archive: &Archive) -> CombineResult<f64>;

    /// Resolve a raw source name to its preferred form. Total; unknown
    /// names pass through unchanged.
    fn canonical_name(&self, raw: &str) -> String;

    /// Phase offset, in turns, by which `candidate` must be rotated to
    /// best superimpose its pulse profile onto `reference`.
    fn phase_offset(&self, reference: &Archive, candidate: &Archive) -> CombineResult<f64>;

    /// Merge `candidate` into `accumulator`, rotating the candidate by
    /// `phase_offset` turns first.
    fn combine(
        &self,
        accumulator: &Archive,
        candidate: &Archive,
        phase_offset: f64,
    ) -> CombineResult<Archive>;

    /// Write a comparison artifact for a rejected attempt. `attempt` is
    /// absent when the tentative merge itself could not be built.
    fn render_diagnostic(
        &self,
        attempt: Option<&Archive>,
        accumulator: &Archive,
        candidate: &Archive,
        out_path: &Path,
    ) -> CombineResult<()>;
}
