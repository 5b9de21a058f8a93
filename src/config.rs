//! Dataset and iterator configuration.
//!
//! [`DatasetConfig`] enumerates every option that changes how a dataset is
//! assembled; [`IterConfig`] covers batch iteration. Both deserialize from
//! JSON, reject unknown keys, and must pass `validate()` before use.
//!
//! ```
//! use semg::{DatasetConfig, SemiDownsample};
//!
//! let cfg = DatasetConfig {
//!     step: 2,
//!     semi_downsample: Some(SemiDownsample::Stride(4)),
//!     semi_downsample_keep: true,
//!     ..DatasetConfig::default()
//! };
//! cfg.validate().unwrap();
//! ```
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SemgError};
use crate::preprocess::Preprocess;
use crate::segment::SegmentMode;

/// Semi-supervised label downsampling policy.
///
/// In JSON this is a bare number: values in `(0, 1)` select
/// [`SemiDownsample::Fraction`], integers `>= 1` select
/// [`SemiDownsample::Stride`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub enum SemiDownsample {
    /// Keep this fraction of rows labeled, chosen by a fixed-seed shuffle.
    Fraction(f64),
    /// Keep every n-th row of each segment labeled.
    Stride(usize),
}

impl SemiDownsample {
    /// Fraction in `(0, 1]`, stride `>= 1`.
    pub fn validate(&self) -> Result<()> {
        match *self {
            SemiDownsample::Fraction(f) if !(f > 0.0 && f <= 1.0) => Err(
                SemgError::InvalidDownsampleConfig(format!("fraction {f} outside (0, 1]")),
            ),
            SemiDownsample::Stride(0) => Err(SemgError::InvalidDownsampleConfig(
                "stride must be >= 1".into(),
            )),
            _ => Ok(()),
        }
    }
}

impl TryFrom<f64> for SemiDownsample {
    type Error = SemgError;

    fn try_from(v: f64) -> Result<Self> {
        if !(v > 0.0) || !v.is_finite() {
            return Err(SemgError::InvalidDownsampleConfig(format!(
                "{v} is neither a fraction in (0, 1] nor a positive stride"
            )));
        }
        if v < 1.0 {
            Ok(SemiDownsample::Fraction(v))
        } else if v.fract() == 0.0 {
            Ok(SemiDownsample::Stride(v as usize))
        } else {
            Err(SemgError::InvalidDownsampleConfig(format!(
                "stride {v} is not an integer"
            )))
        }
    }
}

impl From<SemiDownsample> for f64 {
    fn from(s: SemiDownsample) -> f64 {
        match s {
            SemiDownsample::Fraction(f) => f,
            SemiDownsample::Stride(n) => n as f64,
        }
    }
}

/// Configuration for assembling one dataset from a set of combos.
///
/// All fields are `pub`; use struct-update syntax over
/// [`DatasetConfig::default()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatasetConfig {
    /// Lag of the temporal-difference channel, in frames.
    ///
    /// Default: `1`.
    pub step: usize,

    /// Semi-supervised label masking. `None` keeps every label.
    ///
    /// Default: `None`.
    pub semi_downsample: Option<SemiDownsample>,

    /// With a stride policy, duplicate the rows that keep their label
    /// `stride - 1` extra times instead of only masking the others.
    ///
    /// Default: `false`.
    pub semi_downsample_keep: bool,

    /// Segment on every gesture-id change and drop rest ranges
    /// ([`SegmentMode::NoRest`]) instead of attaching leading rest frames
    /// to each trial.
    ///
    /// Default: `false`.
    pub norest: bool,

    /// Electrode grid rows; `num_semg_row * num_semg_col` must equal the
    /// recording channel count.
    ///
    /// Default: `16`.
    pub num_semg_row: usize,

    /// Electrode grid columns.
    ///
    /// Default: `8`.
    pub num_semg_col: usize,

    /// Per-recording normalisation applied by the recording source.
    ///
    /// Default: [`Preprocess::None`].
    pub preprocess: Preprocess,
}

impl Default for DatasetConfig {
    /// 16 × 8 grid · step 1 · rest-included · no semi-supervision.
    fn default() -> Self {
        Self {
            step: 1,
            semi_downsample: None,
            semi_downsample_keep: false,
            norest: false,
            num_semg_row: 16,
            num_semg_col: 8,
            preprocess: Preprocess::None,
        }
    }
}

impl DatasetConfig {
    /// Reject a zero step or grid, a bad downsample policy, and
    /// `semi_downsample_keep` without a stride policy.
    pub fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(SemgError::InvalidConfig("step must be >= 1".into()));
        }
        if self.num_semg_row == 0 || self.num_semg_col == 0 {
            return Err(SemgError::InvalidConfig(format!(
                "electrode grid {}x{} has no channels",
                self.num_semg_row, self.num_semg_col
            )));
        }
        match self.semi_downsample {
            Some(s) => s.validate()?,
            None if self.semi_downsample_keep => {
                return Err(SemgError::InvalidDownsampleConfig(
                    "semi_downsample_keep set without semi_downsample".into(),
                ))
            }
            None => {}
        }
        if self.semi_downsample_keep
            && matches!(self.semi_downsample, Some(SemiDownsample::Fraction(_)))
        {
            return Err(SemgError::InvalidDownsampleConfig(
                "semi_downsample_keep requires a stride policy".into(),
            ));
        }
        Ok(())
    }

    /// Segmentation mode selected by `norest`.
    pub fn mode(&self) -> SegmentMode {
        if self.norest {
            SegmentMode::NoRest
        } else {
            SegmentMode::RestIncluded
        }
    }

    /// Channels per frame implied by the electrode grid.
    pub fn num_semg_channel(&self) -> usize {
        self.num_semg_row * self.num_semg_col
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// [`DatasetConfig::from_json_str`] on a file's contents.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

/// What to do with a final batch that is shorter than `batch_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LastBatch {
    /// Fill it by wrapping around to the start; `Batch::pad` counts the
    /// wrapped rows.
    #[default]
    Pad,
    /// Drop it.
    Discard,
}

/// Configuration for [`crate::iter::DataIter`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IterConfig {
    /// Rows per batch. Default: `1000`.
    pub batch_size: usize,
    /// Shuffle the traversal order on every reset. Default: `false`.
    pub shuffle: bool,
    /// Oversample rare gesture classes. Default: `false`.
    pub balance_gesture: bool,
    /// Seed for shuffling and balancing; `None` uses the thread RNG.
    pub seed: Option<u64>,
    pub last_batch: LastBatch,
}

impl Default for IterConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            shuffle: false,
            balance_gesture: false,
            seed: None,
            last_batch: LastBatch::Pad,
        }
    }
}

impl IterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SemgError::InvalidConfig("batch_size must be >= 1".into()));
        }
        Ok(())
    }
}
