//! In-memory recordings and trial requests.
use ndarray::{Array1, Array2};

use crate::error::{Result, SemgError};

/// One requested gesture repetition for one subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Combo {
    pub subject: i32,
    pub gesture: i32,
    /// 1-based repetition index within the subject's recording.
    pub trial: u32,
}

impl Combo {
    /// `trial` is the 1-based repetition.
    pub fn new(subject: i32, gesture: i32, trial: u32) -> Self {
        Self { subject, gesture, trial }
    }
}

/// A subject's full decoded recording.
///
/// `signal` is `[frames, channels]`; `gesture_ids[t]` labels frame `t`,
/// with `0` (or negative) meaning rest / background.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecording {
    signal: Array2<f32>,
    gesture_ids: Array1<i32>,
}

impl RawRecording {
    /// Pair a `[T, C]` signal with its `T` gesture ids; fails with
    /// [`SemgError::ShapeMismatch`] when the lengths differ.
    pub fn new(signal: Array2<f32>, gesture_ids: Array1<i32>) -> Result<Self> {
        if signal.nrows() != gesture_ids.len() {
            return Err(SemgError::shape_mismatch(
                "recording gesture ids",
                vec![signal.nrows()],
                vec![gesture_ids.len()],
            ));
        }
        Ok(Self { signal, gesture_ids })
    }

    /// `[frames, channels]` raw signal.
    pub fn signal(&self) -> &Array2<f32> {
        &self.signal
    }

    /// Mutable signal for in-place preprocessing. The frame count must not
    /// change.
    pub fn signal_mut(&mut self) -> &mut Array2<f32> {
        &mut self.signal
    }

    /// Per-frame gesture ids.
    pub fn gesture_ids(&self) -> &Array1<i32> {
        &self.gesture_ids
    }

    /// Number of frames (`T`).
    pub fn frames(&self) -> usize {
        self.signal.nrows()
    }

    /// Number of channels (`C`).
    pub fn channels(&self) -> usize {
        self.signal.ncols()
    }

    /// Consume into `(signal, gesture_ids)`.
    pub fn into_parts(self) -> (Array2<f32>, Array1<i32>) {
        (self.signal, self.gesture_ids)
    }
}
