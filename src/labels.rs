//! Label encodings.
//!
//! Inside the pipeline labels are dense `i32` arrays where `-1` means
//! "ignore"; [`Label`] is the typed form handed to training code.
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sentinel for frames without a usable label.
pub const IGNORE: i32 = -1;

/// A dense class index or an ignored frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Class(usize),
    Ignore,
}

impl Label {
    /// Any negative value is [`Label::Ignore`].
    pub fn from_raw(v: i32) -> Self {
        if v < 0 {
            Label::Ignore
        } else {
            Label::Class(v as usize)
        }
    }

    /// Back to the dense form, [`IGNORE`] for ignored frames.
    pub fn to_raw(self) -> i32 {
        match self {
            Label::Class(c) => c as i32,
            Label::Ignore => IGNORE,
        }
    }

    pub fn class(self) -> Option<usize> {
        match self {
            Label::Class(c) => Some(c),
            Label::Ignore => None,
        }
    }
}

/// Map raw ids to `0..K-1` by rank among the distinct non-ignored values.
/// Values listed in `ignores` pass through unchanged.
///
/// `[7, -1, 3, 7, 9]` with `ignores = [-1]` → `[1, -1, 0, 1, 2]`.
pub fn dense_index(values: &Array1<i32>, ignores: &[i32]) -> Array1<i32> {
    let distinct: Vec<i32> = values
        .iter()
        .copied()
        .filter(|v| !ignores.contains(v))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    values.mapv(|v| {
        if ignores.contains(&v) {
            v
        } else {
            // Present by construction.
            distinct.binary_search(&v).unwrap_or_default() as i32
        }
    })
}

/// `max + 1` over non-negative labels; 0 when everything is ignored.
pub fn num_classes(labels: &Array1<i32>) -> usize {
    labels.iter().copied().max().map_or(0, |m| (m + 1).max(0) as usize)
}
