//! Semi-supervised label downsampling and the matching upsample.
//!
//! Two ways to pick which rows keep their gesture label:
//!
//! * fraction: shuffle all rows with a fixed-seed ChaCha8 RNG and keep
//!   the first `n * fraction` rounded half to even;
//! * stride: a [`StrideSelector`] keeps evenly spaced rows per segment.
//!
//! Everything not kept is relabeled [`IGNORE`].
use ndarray::{concatenate, Array, Array1, Axis, RemoveAxis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;

use crate::error::{Result, SemgError};
use crate::labels::IGNORE;

/// Seed of the fractional policy's shuffle.
pub const SEMI_DOWNSAMPLE_SEED: u64 = 184;

/// Rows whose label is dropped under the fractional policy, in shuffled
/// order.
pub fn fraction_unlabeled(n: usize, fraction: f64, seed: u64) -> Result<Vec<usize>> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(SemgError::InvalidDownsampleConfig(format!(
            "fraction {fraction} outside (0, 1]"
        )));
    }
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    // Ties go to the even count: 2.5 keeps 2.
    let keep = (n as f64 * fraction).round_ties_even() as usize;
    if keep == 0 {
        return Err(SemgError::InvalidDownsampleConfig(format!(
            "fraction {fraction} of {n} rows leaves no labeled row"
        )));
    }
    Ok(rows.split_off(keep.min(n)))
}

/// Chooses the rows that stay labeled under a stride policy.
pub trait StrideSelector {
    /// Row positions to keep, ascending. `segment[i]` is row `i`'s segment.
    fn select(&self, stride: usize, segment: &Array1<usize>) -> Vec<usize>;
}

/// Keeps the first row of every segment and every `stride`-th row after
/// it, counting within the segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvenSegmentStride;

impl StrideSelector for EvenSegmentStride {
    fn select(&self, stride: usize, segment: &Array1<usize>) -> Vec<usize> {
        let stride = stride.max(1);
        let mut seen: HashMap<usize, usize> = HashMap::new();
        segment
            .iter()
            .enumerate()
            .filter_map(|(row, &seg)| {
                let k = seen.entry(seg).or_insert(0);
                let keep = *k % stride == 0;
                *k += 1;
                keep.then_some(row)
            })
            .collect()
    }
}

/// Set `gesture` to [`IGNORE`] on every row not in `keep`. Returns the
/// per-row keep mask.
pub fn mask_unselected(gesture: &mut Array1<i32>, keep: &[usize]) -> Result<Vec<bool>> {
    let n = gesture.len();
    let mut selected = vec![false; n];
    for &row in keep {
        if row >= n {
            return Err(SemgError::InvalidDownsampleConfig(format!(
                "selected row {row} beyond {n} rows"
            )));
        }
        selected[row] = true;
    }
    for (g, &sel) in gesture.iter_mut().zip(&selected) {
        if !sel {
            *g = IGNORE;
        }
    }
    Ok(selected)
}

/// `data ++ copies × data[rows]` along the first axis.
pub fn upsample_rows<A, D>(data: &Array<A, D>, rows: &[usize], copies: usize) -> Result<Array<A, D>>
where
    A: Clone,
    D: RemoveAxis,
{
    let picked = data.select(Axis(0), rows);
    let mut parts = Vec::with_capacity(copies + 1);
    parts.push(data.view());
    parts.extend(std::iter::repeat(picked.view()).take(copies));
    concatenate(Axis(0), &parts).map_err(|_| {
        SemgError::shape_mismatch("upsample", data.shape().to_vec(), picked.shape().to_vec())
    })
}
