//! Per-recording normalisation applied before segmentation.
//!
//! Signals are `[T, C]` (frames × channels).
//!
//! * `zscore_global_inplace`: μ, σ over every frame and channel (ddof = 0)
//! * `zscore_channel_inplace`: μ, σ per channel over time (ddof = 0)
//!
//! Channels or recordings with σ = 0 are only centred.
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Normalisation a [`crate::cache::RecordingSource`] applies to each
/// signal it loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preprocess {
    #[default]
    None,
    ZscoreGlobal,
    ZscoreChannel,
}

impl Preprocess {
    pub fn apply(&self, signal: &mut Array2<f32>) {
        match self {
            Preprocess::None => {}
            Preprocess::ZscoreGlobal => {
                zscore_global_inplace(signal);
            }
            Preprocess::ZscoreChannel => {
                zscore_channel_inplace(signal);
            }
        }
    }
}

/// Global z-score. Returns the (mean, std) that were removed.
pub fn zscore_global_inplace(signal: &mut Array2<f32>) -> (f32, f32) {
    if signal.is_empty() {
        return (0.0, 0.0);
    }
    let n = signal.len() as f64;
    let mean = signal.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = signal.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
    let (mean, std) = (mean as f32, var.sqrt() as f32);

    if std > 0.0 {
        signal.mapv_inplace(|v| (v - mean) / std);
    } else {
        signal.mapv_inplace(|v| v - mean);
    }
    (mean, std)
}

/// Per-channel z-score along the time axis. Returns per-channel (mean, std).
pub fn zscore_channel_inplace(signal: &mut Array2<f32>) -> (Array1<f32>, Array1<f32>) {
    let n_ch = signal.ncols();
    let mut means = Array1::<f32>::zeros(n_ch);
    let mut stds = Array1::<f32>::zeros(n_ch);
    if signal.nrows() == 0 {
        return (means, stds);
    }

    for (c, mut col) in signal.axis_iter_mut(Axis(1)).enumerate() {
        let n = col.len() as f64;
        let mean = col.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = col.iter().map(|&v| (v as f64 - mean).powi(2)).sum::<f64>() / n;
        let (m, s) = (mean as f32, var.sqrt() as f32);
        if s > 0.0 {
            col.mapv_inplace(|v| (v - m) / s);
        } else {
            col.mapv_inplace(|v| v - m);
        }
        means[c] = m;
        stds[c] = s;
    }
    (means, stds)
}
