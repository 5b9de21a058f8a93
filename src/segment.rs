//! Trial segmentation and the temporal-difference channel.
//!
//! A recording's per-frame gesture ids are cut at boundary frames
//! ([`breaks`]); consecutive boundaries delimit candidate trials, and a
//! candidate whose last frame carries a positive id becomes the next
//! repetition of that gesture.
//!
//! ```text
//! ids        0 0 1 1 0 0 2 2 0 1 1
//! NoRest         [1 1]    [2 2]  [1 1]       rest ranges dropped
//! RestIncl.  [0 0 1 1][0 0 2 2][0 1 1]       leading rest kept
//! ```
use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, SemgError};
use crate::recording::RawRecording;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentMode {
    /// Boundary at every id change; only active ranges become trials.
    NoRest,
    /// Boundary after every gesture → rest transition; each trial carries
    /// the rest frames that precede its gesture.
    RestIncluded,
}

/// `(gesture, repetition)` with 1-based repetition in order of occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrialKey {
    pub gesture: i32,
    pub repetition: u32,
}

/// Frames `[begin, end)` of one recording with their derived streams.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub begin: usize,
    pub end: usize,
    /// `[n, C]` raw signal.
    pub semg: Array2<f32>,
    /// `[n, C]` temporal difference, computed on the full recording.
    pub diff: Array2<f32>,
    /// `[n]` local gesture ids.
    pub gesture: Array1<i32>,
}

impl Trial {
    /// Frames in the trial, `end - begin`.
    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    /// `true` for a zero-frame range.
    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

pub type TrialMap = BTreeMap<TrialKey, Trial>;

/// Lag-`step` backward difference, same shape as `signal`.
///
/// `diff[t] = signal[t] - signal[t - step]` for `t >= step`; the first
/// `step` frames are differenced against themselves and are zero.
pub fn temporal_diff(signal: ArrayView2<f32>, step: usize) -> Array2<f32> {
    let n = signal.nrows();
    let mut diff = Array2::<f32>::zeros(signal.raw_dim());
    if step < n {
        let cur = signal.slice(s![step.., ..]);
        let prev = signal.slice(s![..n - step, ..]);
        diff.slice_mut(s![step.., ..]).assign(&(&cur - &prev));
    }
    diff
}

/// Sorted boundary frames for `mode`.
///
/// An implicit boundary at `len` closes a trailing gesture.
pub fn breaks(gesture_ids: ArrayView1<i32>, mode: SegmentMode) -> Vec<usize> {
    let g = gesture_ids;
    let n = g.len();
    if n == 0 {
        return vec![];
    }

    let mut out = match mode {
        SegmentMode::NoRest => {
            let mut b = Vec::new();
            if g[0] > 0 {
                b.push(0);
            }
            b.extend((1..n).filter(|&i| g[i - 1] != g[i]));
            b
        }
        SegmentMode::RestIncluded => {
            let mut b = vec![0];
            b.extend((1..n).filter(|&i| g[i - 1] > 0 && g[i] == 0));
            b
        }
    };
    if g[n - 1] > 0 {
        out.push(n);
    }
    out
}

/// Split one recording into trials keyed by `(gesture, repetition)`.
pub fn segment(
    signal: ArrayView2<f32>,
    gesture_ids: ArrayView1<i32>,
    mode: SegmentMode,
    step: usize,
) -> Result<TrialMap> {
    if signal.nrows() != gesture_ids.len() {
        return Err(SemgError::shape_mismatch(
            "segment gesture ids",
            vec![signal.nrows()],
            vec![gesture_ids.len()],
        ));
    }
    if step == 0 {
        return Err(SemgError::InvalidConfig("diff step must be >= 1".into()));
    }

    let diff = temporal_diff(signal, step);
    let bounds = breaks(gesture_ids, mode);

    let mut seen: HashMap<i32, u32> = HashMap::new();
    let mut trials = TrialMap::new();
    for w in bounds.windows(2) {
        let (begin, end) = (w[0], w[1]);
        let g = gesture_ids[end - 1];
        if g <= 0 {
            if mode == SegmentMode::RestIncluded {
                return Err(SemgError::Boundary { begin, end, gesture: g });
            }
            continue;
        }
        let rep = seen.entry(g).or_insert(0);
        *rep += 1;
        trials.insert(
            TrialKey { gesture: g, repetition: *rep },
            Trial {
                begin,
                end,
                semg: signal.slice(s![begin..end, ..]).to_owned(),
                diff: diff.slice(s![begin..end, ..]).to_owned(),
                gesture: gesture_ids.slice(s![begin..end]).to_owned(),
            },
        );
    }

    if trials.is_empty() && gesture_ids.iter().any(|&g| g > 0) {
        return Err(SemgError::EmptySegment { frames: gesture_ids.len() });
    }
    Ok(trials)
}

/// [`segment`] over a [`RawRecording`].
pub fn segment_recording(rec: &RawRecording, mode: SegmentMode, step: usize) -> Result<TrialMap> {
    segment(rec.signal().view(), rec.gesture_ids().view(), mode, step)
}
