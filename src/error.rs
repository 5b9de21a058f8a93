//! Error types for the sEMG dataset pipeline.
//!
//! Every fallible library function returns [`Result<T>`]. Binaries wrap
//! these in `anyhow` for reporting.
//!
//! ```text
//! SemgError
//! ├── ShapeMismatch            parallel arrays disagree in length / dims
//! ├── EmptySegment             recording has gestures but no trials
//! ├── EmptyDataset             assembly produced zero rows
//! ├── CacheMiss                (gesture, trial) absent for a subject
//! ├── InvalidDownsampleConfig  bad fraction / stride, empty labeled set
//! ├── InvalidConfig            any other rejected option
//! ├── Boundary                 rest-included trial closing on rest
//! ├── Load                     recording source failure
//! ├── Json / Io                wrapped foreign errors
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Convenient `Result` alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SemgError>;

#[derive(Debug, Error)]
pub enum SemgError {
    /// Two arrays that must be aligned are not.
    #[error("shape mismatch in {what}: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        what: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// The recording contains active gesture frames but the boundary rule
    /// produced no trial.
    #[error("recording of {frames} frames has active gestures but yielded no trials")]
    EmptySegment { frames: usize },

    /// No rows survived assembly.
    #[error("dataset is empty")]
    EmptyDataset,

    /// The requested repetition does not occur in the subject's recording.
    #[error("no trial for subject {subject}, gesture {gesture}, repetition {trial}")]
    CacheMiss { subject: i32, gesture: i32, trial: u32 },

    #[error("invalid semi-supervised downsample: {0}")]
    InvalidDownsampleConfig(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A rest-included range closed on a non-positive gesture id.
    #[error("trial [{begin}, {end}) closes on non-positive gesture id {gesture}")]
    Boundary { begin: usize, end: usize, gesture: i32 },

    #[error("failed to load {path:?}: {message}")]
    Load { path: PathBuf, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SemgError {
    pub fn shape_mismatch(what: &'static str, expected: Vec<usize>, actual: Vec<usize>) -> Self {
        SemgError::ShapeMismatch { what, expected, actual }
    }

    pub fn load<S: Into<String>>(path: impl Into<PathBuf>, message: S) -> Self {
        SemgError::Load { path: path.into(), message: message.into() }
    }
}
