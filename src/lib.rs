//! # semg: sEMG gesture-trial segmentation and dataset assembly
//!
//! `semg` turns continuous per-subject surface-EMG recordings with a
//! frame-level gesture-id stream into aligned training arrays for
//! gesture-recognition models.
//!
//! ## Pipeline overview
//!
//! ```text
//! <root>/<subject>.safetensors          (or any RecordingSource)
//!   │
//!   ├─ preprocess           optional z-score per recording
//!   ├─ segment              gesture-id boundaries → (gesture, repetition) trials
//!   │                       + lag-`step` temporal diff channel
//!   ├─ cache                segment each subject at most once
//!   ├─ resolve              combo (subject, gesture, trial) → relabeled trial
//!   ├─ assemble             stack, reshape to [N, 1, row, col], dense labels,
//!   │                       semi-supervised downsample / upsample
//!   └─ iter                 padded batches of named data / label streams
//!        │
//!        └─→ semg [B, 1, R, C] · gesture [B] · diff [B, C] · subject [B] · segment [B]
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use semg::{build_dataiter, Combo, DatasetConfig, IterConfig, SafetensorsSource};
//!
//! let cfg = DatasetConfig::default();            // 16 × 8 grid, step 1
//! let source = SafetensorsSource::from_config("data/dbb", &cfg);
//! let combos: Vec<Combo> = (1..=8)
//!     .flat_map(|g| (1..=10).map(move |t| Combo::new(2, g, t)))
//!     .collect();
//!
//! let iter = build_dataiter(source, &combos, &cfg, IterConfig::default()).unwrap();
//! println!("{} gestures, {} batches", iter.num_gesture(), iter.num_batches());
//! for batch in iter {
//!     assert_eq!(batch.semg.dim().0, batch.gesture.len());
//! }
//! ```
//!
//! ## Running individual steps
//!
//! ```
//! use semg::segment::{segment, temporal_diff, SegmentMode, TrialKey};
//! use ndarray::{arr1, Array2};
//!
//! let signal = Array2::<f32>::zeros((6, 4));
//! let ids = arr1(&[0, 3, 3, 0, 3, 3]);
//!
//! let trials = segment(signal.view(), ids.view(), SegmentMode::NoRest, 1).unwrap();
//! assert_eq!(trials.len(), 2);
//! assert_eq!(trials[&TrialKey { gesture: 3, repetition: 2 }].begin, 4);
//!
//! let diff = temporal_diff(signal.view(), 1);
//! assert_eq!(diff.dim(), signal.dim());
//! ```

pub mod assemble;
pub mod cache;
pub mod config;
pub mod downsample;
pub mod error;
pub mod io;
pub mod iter;
pub mod labels;
pub mod preprocess;
pub mod recording;
pub mod resolve;
pub mod segment;

// ── Crate-root re-exports ─────────────────────────────────────────────────

pub use assemble::{assemble, assemble_with, Dataset};
pub use cache::{InMemorySource, RecordingSource, SharedTrialCache, TrialCache};
pub use config::{DatasetConfig, IterConfig, LastBatch, SemiDownsample};
pub use downsample::{EvenSegmentStride, StrideSelector, SEMI_DOWNSAMPLE_SEED};
pub use error::{Result, SemgError};
pub use io::{read_recording, write_dataset, write_recording, write_tensors, SafetensorsSource, Tensor};
pub use iter::{BalancePolicy, Batch, DataIter, NoBalance, OversampleGestures};
pub use labels::{dense_index, Label, IGNORE};
pub use preprocess::Preprocess;
pub use recording::{Combo, RawRecording};
pub use resolve::{get_trial, LabeledTrial};
pub use segment::{breaks, segment, temporal_diff, SegmentMode, Trial, TrialKey, TrialMap};

/// Load, segment and assemble `combos` from `source`, then wrap the result
/// in a [`DataIter`].
///
/// This is the one-call entry point; use [`TrialCache`] and [`assemble`]
/// directly to reuse a cache across several datasets (e.g. train and
/// validation splits of the same subjects).
///
/// # Errors
///
/// Any [`SemgError`] from configuration validation, loading, segmentation,
/// combo resolution or assembly. No partial dataset is produced.
pub fn build_dataiter<S: RecordingSource>(
    source: S,
    combos: &[Combo],
    cfg: &DatasetConfig,
    iter_cfg: IterConfig,
) -> Result<DataIter> {
    cfg.validate()?;
    let mut cache = TrialCache::from_config(source, cfg);
    let dataset = Dataset::build(combos, &mut cache, cfg)?;
    DataIter::new(dataset, iter_cfg)
}
