//! Dataset assembly: resolve combos, stack, remap labels, semi-supervise.
//!
//! ```text
//! combos ──get_trial──▶ [LabeledTrial; k]
//!   ├─ stack rows             semg [N, C] → [N, 1, row, col], diff [N, C]
//!   ├─ native index           0..N
//!   ├─ dense remap            gesture, subject → 0..K-1 (−1 kept)
//!   └─ semi-downsample        fraction: mask by seeded shuffle
//!                             stride:   mask all but every n-th row per
//!                                       segment; with keep, append n−1
//!                                       copies of the kept rows and
//!                                       regenerate the index
//! ```
use ndarray::{concatenate, Array, Array1, Array2, Array4, ArrayView, Axis, RemoveAxis};
use tracing::{debug, info};

use crate::cache::{RecordingSource, TrialCache};
use crate::config::{DatasetConfig, SemiDownsample};
use crate::downsample::{
    fraction_unlabeled, mask_unselected, upsample_rows, EvenSegmentStride, StrideSelector,
    SEMI_DOWNSAMPLE_SEED,
};
use crate::error::{Result, SemgError};
use crate::labels::{dense_index, num_classes, IGNORE};
use crate::recording::Combo;
use crate::resolve::LabeledTrial;

/// Row-aligned training arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    /// `[N, 1, num_semg_row, num_semg_col]`
    pub semg: Array4<f32>,
    /// `[N, C]`
    pub diff: Array2<f32>,
    /// Dense gesture index, `-1` = ignore.
    pub gesture: Array1<i32>,
    /// Dense subject index.
    pub subject: Array1<i32>,
    /// Position of the source combo in the request.
    pub segment: Array1<usize>,
    /// Row positions to traverse.
    pub index: Vec<usize>,
    pub num_gesture: usize,
    pub num_subject: usize,
}

impl Dataset {
    /// Assemble `combos` from a trial cache with the default stride
    /// selector.
    ///
    /// The cache must segment the way `cfg` asks (`norest`, `step`);
    /// otherwise this fails with [`SemgError::InvalidConfig`].
    pub fn build<S: RecordingSource>(
        combos: &[Combo],
        cache: &mut TrialCache<S>,
        cfg: &DatasetConfig,
    ) -> Result<Self> {
        if cache.mode() != cfg.mode() || cache.step() != cfg.step {
            return Err(SemgError::InvalidConfig(format!(
                "trial cache segments with {:?} step {}, config asks for {:?} step {}",
                cache.mode(),
                cache.step(),
                cfg.mode(),
                cfg.step
            )));
        }
        assemble(combos, |c| cache.get_trial(c), cfg)
    }

    /// Row count shared by all five arrays.
    pub fn len(&self) -> usize {
        self.gesture.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gesture.is_empty()
    }

    /// Number of `-1` gesture rows.
    pub fn num_ignored(&self) -> usize {
        self.gesture.iter().filter(|&&g| g == IGNORE).count()
    }

    /// All five arrays share one row count and `index` stays in range.
    pub fn check_aligned(&self) -> Result<()> {
        let n = self.gesture.len();
        let rows = [
            ("semg", self.semg.len_of(Axis(0))),
            ("diff", self.diff.nrows()),
            ("subject", self.subject.len()),
            ("segment", self.segment.len()),
        ];
        for (what, got) in rows {
            if got != n {
                return Err(SemgError::shape_mismatch(what, vec![n], vec![got]));
            }
        }
        if let Some(&bad) = self.index.iter().find(|&&i| i >= n) {
            return Err(SemgError::shape_mismatch("index", vec![n], vec![bad]));
        }
        Ok(())
    }
}

/// [`assemble_with`] using [`EvenSegmentStride`].
pub fn assemble<F>(combos: &[Combo], get_trial: F, cfg: &DatasetConfig) -> Result<Dataset>
where
    F: FnMut(&Combo) -> Result<LabeledTrial>,
{
    assemble_with(combos, get_trial, cfg, &EvenSegmentStride)
}

/// Build a [`Dataset`] from `combos`, in order. Any resolution error
/// aborts the whole assembly.
pub fn assemble_with<F, Sel>(
    combos: &[Combo],
    mut get_trial: F,
    cfg: &DatasetConfig,
    selector: &Sel,
) -> Result<Dataset>
where
    F: FnMut(&Combo) -> Result<LabeledTrial>,
    Sel: StrideSelector + ?Sized,
{
    cfg.validate()?;
    if combos.is_empty() {
        return Err(SemgError::EmptyDataset);
    }

    let mut semg = Vec::with_capacity(combos.len());
    let mut diff = Vec::with_capacity(combos.len());
    let mut gesture = Vec::with_capacity(combos.len());
    let mut subject = Vec::with_capacity(combos.len());
    let mut segment = Vec::with_capacity(combos.len());
    for (seg, combo) in combos.iter().enumerate() {
        let trial = get_trial(combo)?;
        segment.push(Array1::from_elem(trial.len(), seg));
        semg.push(trial.semg);
        diff.push(trial.diff);
        gesture.push(trial.gesture);
        subject.push(trial.subject);
    }
    debug!(segments = semg.len(), first = ?semg[0].dim(), "trials loaded");

    let total: usize = segment.iter().map(|s| s.len()).sum();
    if total == 0 {
        return Err(SemgError::EmptyDataset);
    }
    let mut index: Vec<usize> = (0..total).collect();
    debug!(rows = total, "index made");

    let flat = stack_rows(&semg, "semg")?;
    let mut diff = stack_rows(&diff, "diff")?;
    if flat.nrows() != diff.nrows() {
        return Err(SemgError::shape_mismatch("diff rows", vec![flat.nrows()], vec![diff.nrows()]));
    }
    if flat.ncols() != cfg.num_semg_channel() {
        return Err(SemgError::shape_mismatch(
            "semg channels",
            vec![cfg.num_semg_row, cfg.num_semg_col],
            vec![flat.ncols()],
        ));
    }
    let mut semg = flat
        .into_shape_with_order((total, 1, cfg.num_semg_row, cfg.num_semg_col))
        .map_err(|_| SemgError::shape_mismatch("semg reshape", vec![total], vec![total]))?;
    debug!(semg = ?semg.dim(), diff = ?diff.dim(), "data stacked");

    let mut gesture = dense_index(&stack_rows(&gesture, "gesture")?, &[IGNORE]);
    let mut subject = dense_index(&stack_rows(&subject, "subject")?, &[IGNORE]);
    let mut segment = stack_rows(&segment, "segment")?;

    match cfg.semi_downsample {
        None => {}
        Some(SemiDownsample::Fraction(fraction)) => {
            let unlabeled = fraction_unlabeled(total, fraction, SEMI_DOWNSAMPLE_SEED)?;
            for &row in &unlabeled {
                gesture[row] = IGNORE;
            }
            info!(
                "Semi-downsample: kept {:.2}% labeled",
                100.0 * (1.0 - unlabeled.len() as f64 / total as f64)
            );
        }
        Some(SemiDownsample::Stride(stride)) => {
            let keep = selector.select(stride, &segment);
            let selected = mask_unselected(&mut gesture, &keep)?;
            let rows: Vec<usize> = selected
                .iter()
                .enumerate()
                .filter_map(|(i, &s)| s.then_some(i))
                .collect();
            info!("Semi-downsample: selected {:.2}%", 100.0 * rows.len() as f64 / total as f64);

            if cfg.semi_downsample_keep {
                let copies = stride - 1;
                info!(
                    "Semi-upsample from {} to {}",
                    total,
                    total + copies * rows.len()
                );
                semg = upsample_rows(&semg, &rows, copies)?;
                diff = upsample_rows(&diff, &rows, copies)?;
                gesture = upsample_rows(&gesture, &rows, copies)?;
                subject = upsample_rows(&subject, &rows, copies)?;
                segment = upsample_rows(&segment, &rows, copies)?;
                index = (0..semg.len_of(Axis(0))).collect();
            }
        }
    }

    let dataset = Dataset {
        num_gesture: num_classes(&gesture),
        num_subject: num_classes(&subject),
        semg,
        diff,
        gesture,
        subject,
        segment,
        index,
    };
    dataset.check_aligned()?;
    debug!(
        rows = dataset.len(),
        num_gesture = dataset.num_gesture,
        num_subject = dataset.num_subject,
        "dataset ready"
    );
    Ok(dataset)
}

fn stack_rows<A, D>(parts: &[Array<A, D>], what: &'static str) -> Result<Array<A, D>>
where
    A: Clone,
    D: RemoveAxis,
{
    let views: Vec<ArrayView<A, D>> = parts.iter().map(|p| p.view()).collect();
    concatenate(Axis(0), &views).map_err(|_| {
        let first = parts.first().map(|p| p.shape().to_vec()).unwrap_or_default();
        let odd = parts
            .iter()
            .map(|p| p.shape().to_vec())
            .find(|s| s[1..] != first[1..])
            .unwrap_or_default();
        SemgError::shape_mismatch(what, first, odd)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    fn trial(n: usize, ch: usize, gesture: i32, subject: i32) -> LabeledTrial {
        LabeledTrial {
            semg: Array2::from_elem((n, ch), subject as f32),
            diff: Array2::zeros((n, ch)),
            gesture: Array1::from_elem(n, gesture),
            subject: Array1::from_elem(n, subject),
        }
    }

    fn cfg(row: usize, col: usize) -> DatasetConfig {
        DatasetConfig { num_semg_row: row, num_semg_col: col, ..DatasetConfig::default() }
    }

    #[test]
    fn stacks_and_remaps() {
        let combos = [Combo::new(5, 8, 1), Combo::new(2, 3, 1), Combo::new(5, 3, 2)];
        let ds = assemble(&combos, |c| Ok(trial(2, 4, c.gesture, c.subject)), &cfg(2, 2)).unwrap();
        assert_eq!(ds.semg.dim(), (6, 1, 2, 2));
        assert_eq!(ds.gesture, arr1(&[1, 1, 0, 0, 0, 0]));
        assert_eq!(ds.subject, arr1(&[1, 1, 0, 0, 1, 1]));
        assert_eq!(ds.segment, arr1(&[0, 0, 1, 1, 2, 2]));
        assert_eq!(ds.index, (0..6).collect::<Vec<_>>());
        assert_eq!((ds.num_gesture, ds.num_subject), (2, 2));
        assert_eq!(ds.semg[[2, 0, 1, 1]], 2.0);
    }

    #[test]
    fn grid_must_match_channels() {
        let err = assemble(&[Combo::new(1, 1, 1)], |_| Ok(trial(3, 5, 1, 1)), &cfg(2, 2))
            .unwrap_err();
        assert!(matches!(err, SemgError::ShapeMismatch { what: "semg channels", .. }));
    }

    #[test]
    fn channel_count_must_agree_across_trials() {
        let mut n = 0;
        let err = assemble(
            &[Combo::new(1, 1, 1), Combo::new(1, 1, 2)],
            |_| {
                n += 1;
                Ok(trial(3, n, 1, 1))
            },
            &cfg(1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, SemgError::ShapeMismatch { what: "semg", .. }));
    }

    #[test]
    fn empty_inputs() {
        let err = assemble(&[], |_| Ok(trial(1, 1, 1, 1)), &cfg(1, 1)).unwrap_err();
        assert!(matches!(err, SemgError::EmptyDataset));
        let err = assemble(&[Combo::new(1, 1, 1)], |_| Ok(trial(0, 1, 1, 1)), &cfg(1, 1))
            .unwrap_err();
        assert!(matches!(err, SemgError::EmptyDataset));
    }

    #[test]
    fn resolution_error_aborts() {
        let err = assemble(
            &[Combo::new(1, 1, 1), Combo::new(1, 1, 9)],
            |c| {
                if c.trial == 9 {
                    Err(SemgError::CacheMiss { subject: c.subject, gesture: c.gesture, trial: c.trial })
                } else {
                    Ok(trial(2, 1, 1, 1))
                }
            },
            &cfg(1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, SemgError::CacheMiss { trial: 9, .. }));
    }
}
