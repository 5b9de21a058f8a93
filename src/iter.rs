//! Batch iteration over an assembled [`Dataset`].
//!
//! Streams are named the way the training graph binds them: one data
//! stream (`semg`) and four label streams (`gesture`, `diff`, `subject`,
//! `segment`). Traversal follows the dataset's `index`, optionally
//! rebalanced by a [`BalancePolicy`] and shuffled, and restarts on
//! [`DataIter::reset`].
use ndarray::{Array1, Array2, Array4, Axis};
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use tracing::debug;

use crate::assemble::Dataset;
use crate::config::{IterConfig, LastBatch};
use crate::error::{Result, SemgError};
use crate::labels::Label;

pub const DATA_NAMES: [&str; 1] = ["semg"];
pub const LABEL_NAMES: [&str; 4] = ["gesture", "diff", "subject", "segment"];

/// Decides the per-epoch traversal order before shuffling.
pub trait BalancePolicy {
    fn order(&self, index: &[usize], gesture: &Array1<i32>, rng: &mut dyn RngCore) -> Vec<usize>;
}

/// Traverse `index` as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBalance;

impl BalancePolicy for NoBalance {
    fn order(&self, index: &[usize], _gesture: &Array1<i32>, _rng: &mut dyn RngCore) -> Vec<usize> {
        index.to_vec()
    }
}

/// Top up every labeled gesture class to the size of the largest one by
/// drawing extra rows of that class with replacement. Ignored rows are
/// visited once.
#[derive(Debug, Clone, Copy, Default)]
pub struct OversampleGestures;

impl BalancePolicy for OversampleGestures {
    fn order(&self, index: &[usize], gesture: &Array1<i32>, rng: &mut dyn RngCore) -> Vec<usize> {
        let mut by_class: BTreeMap<i32, Vec<usize>> = BTreeMap::new();
        for &row in index {
            let g = gesture[row];
            if g >= 0 {
                by_class.entry(g).or_default().push(row);
            }
        }
        let largest = by_class.values().map(Vec::len).max().unwrap_or(0);

        let mut order = index.to_vec();
        for rows in by_class.values() {
            for _ in rows.len()..largest {
                if let Some(&row) = rows.choose(&mut *rng) {
                    order.push(row);
                }
            }
        }
        order
    }
}

/// One window of aligned rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub semg: Array4<f32>,
    pub diff: Array2<f32>,
    pub gesture: Vec<Label>,
    pub subject: Array1<i32>,
    pub segment: Array1<usize>,
    /// Dataset row of each batch row.
    pub index: Vec<usize>,
    /// Trailing rows that wrapped around to fill the batch.
    pub pad: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Gesture labels in the dense `-1`-sentinel form.
    pub fn gesture_raw(&self) -> Array1<i32> {
        self.gesture.iter().map(|l| l.to_raw()).collect()
    }
}

pub struct DataIter {
    dataset: Dataset,
    config: IterConfig,
    balance: Box<dyn BalancePolicy + Send + Sync>,
    rng: ChaCha8Rng,
    order: Vec<usize>,
    cursor: usize,
}

impl std::fmt::Debug for DataIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataIter")
            .field("rows", &self.dataset.len())
            .field("config", &self.config)
            .field("order", &self.order.len())
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

impl DataIter {
    /// Validate `config` and the dataset alignment, then build the first
    /// epoch order. A `None` seed draws one from the thread RNG.
    pub fn new(dataset: Dataset, config: IterConfig) -> Result<Self> {
        config.validate()?;
        dataset.check_aligned()?;
        if dataset.index.is_empty() {
            return Err(SemgError::EmptyDataset);
        }
        let balance: Box<dyn BalancePolicy + Send + Sync> = if config.balance_gesture {
            Box::new(OversampleGestures)
        } else {
            Box::new(NoBalance)
        };
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::seed_from_u64(rand::random()),
        };
        let mut it = Self { dataset, config, balance, rng, order: Vec::new(), cursor: 0 };
        it.reset();
        Ok(it)
    }

    /// Replace the balancing policy and restart.
    pub fn with_balance<P>(mut self, policy: P) -> Self
    where
        P: BalancePolicy + Send + Sync + 'static,
    {
        self.balance = Box::new(policy);
        self.reset();
        self
    }

    /// Rebuild the traversal order and rewind.
    pub fn reset(&mut self) {
        let mut order = self.balance.order(&self.dataset.index, &self.dataset.gesture, &mut self.rng);
        if self.config.shuffle {
            order.shuffle(&mut self.rng);
        }
        self.order = order;
        self.cursor = 0;
        debug!(rows = self.order.len(), batches = self.num_batches(), "iterator reset");
    }

    /// Batches per epoch under the configured [`LastBatch`] rule.
    pub fn num_batches(&self) -> usize {
        let n = self.order.len();
        let bs = self.config.batch_size;
        match self.config.last_batch {
            LastBatch::Pad => n.div_ceil(bs),
            LastBatch::Discard => n / bs,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.config.batch_size
    }

    /// Dense gesture classes in the dataset.
    pub fn num_gesture(&self) -> usize {
        self.dataset.num_gesture
    }

    /// Dense subjects in the dataset.
    pub fn num_subject(&self) -> usize {
        self.dataset.num_subject
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Rows visited per epoch, after balancing.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// [`DATA_NAMES`]
    pub fn data_names(&self) -> &'static [&'static str] {
        &DATA_NAMES
    }

    /// [`LABEL_NAMES`]
    pub fn label_names(&self) -> &'static [&'static str] {
        &LABEL_NAMES
    }

    /// `(name, shape)` of each data stream, batch axis first.
    pub fn provide_data(&self) -> Vec<(&'static str, Vec<usize>)> {
        let (_, ch, row, col) = self.dataset.semg.dim();
        vec![(DATA_NAMES[0], vec![self.config.batch_size, ch, row, col])]
    }

    /// `(name, shape)` of each label stream, batch axis first.
    pub fn provide_label(&self) -> Vec<(&'static str, Vec<usize>)> {
        let bs = self.config.batch_size;
        vec![
            (LABEL_NAMES[0], vec![bs]),
            (LABEL_NAMES[1], vec![bs, self.dataset.diff.ncols()]),
            (LABEL_NAMES[2], vec![bs]),
            (LABEL_NAMES[3], vec![bs]),
        ]
    }

    fn next_batch(&mut self) -> Option<Batch> {
        let n = self.order.len();
        let bs = self.config.batch_size;
        if self.cursor >= n {
            return None;
        }

        let end = self.cursor + bs;
        let (rows, pad) = if end <= n {
            (self.order[self.cursor..end].to_vec(), 0)
        } else {
            match self.config.last_batch {
                LastBatch::Discard => {
                    self.cursor = n;
                    return None;
                }
                LastBatch::Pad => {
                    let pad = end - n;
                    let mut rows = self.order[self.cursor..].to_vec();
                    rows.extend(self.order.iter().cycle().take(pad));
                    (rows, pad)
                }
            }
        };
        self.cursor = end;

        let ds = &self.dataset;
        Some(Batch {
            semg: ds.semg.select(Axis(0), &rows),
            diff: ds.diff.select(Axis(0), &rows),
            gesture: rows.iter().map(|&r| Label::from_raw(ds.gesture[r])).collect(),
            subject: ds.subject.select(Axis(0), &rows),
            segment: ds.segment.select(Axis(0), &rows),
            index: rows,
            pad,
        })
    }
}

impl Iterator for DataIter {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        self.next_batch()
    }
}
