//! Combo resolution: `(subject, gesture, trial)` → relabeled trial data.
use ndarray::{Array1, Array2, ArrayView1};

use crate::error::{Result, SemgError};
use crate::recording::Combo;
use crate::segment::{TrialKey, TrialMap};

/// One resolved combo, ready to be stacked.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTrial {
    pub semg: Array2<f32>,
    pub diff: Array2<f32>,
    /// Combo gesture id, or `-1` on rest frames.
    pub gesture: Array1<i32>,
    /// Combo subject id on every frame.
    pub subject: Array1<i32>,
}

impl LabeledTrial {
    pub fn len(&self) -> usize {
        self.semg.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.semg.nrows() == 0
    }
}

/// Replace every frame label with `gesture`, except local rest (`0`)
/// frames which become `-1`.
pub fn relabel(local: ArrayView1<i32>, gesture: i32) -> Array1<i32> {
    local.mapv(|g| if g == 0 { -1 } else { gesture })
}

/// Look up `combo` in one subject's trial map.
pub fn get_trial(trials: &TrialMap, combo: &Combo) -> Result<LabeledTrial> {
    let key = TrialKey { gesture: combo.gesture, repetition: combo.trial };
    let trial = trials.get(&key).ok_or(SemgError::CacheMiss {
        subject: combo.subject,
        gesture: combo.gesture,
        trial: combo.trial,
    })?;

    if trial.diff.dim() != trial.semg.dim() {
        let (a, b) = (trial.semg.dim(), trial.diff.dim());
        return Err(SemgError::shape_mismatch("trial diff", vec![a.0, a.1], vec![b.0, b.1]));
    }

    let n = trial.semg.nrows();
    Ok(LabeledTrial {
        semg: trial.semg.clone(),
        diff: trial.diff.clone(),
        gesture: relabel(trial.gesture.view(), combo.gesture),
        subject: Array1::from_elem(n, combo.subject),
    })
}
