//! Per-subject trial memoization.
//!
//! A [`TrialCache`] asks its [`RecordingSource`] for a subject's recording
//! the first time that subject is referenced, segments it once, and keeps
//! the full `(gesture, repetition) → Trial` map for its own lifetime.
//! Nothing is evicted.
//!
//! `TrialCache` needs `&mut self`. To share one between threads use
//! [`SharedTrialCache`], which holds the lock across load + segment so a
//! subject is never segmented twice.
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::config::DatasetConfig;
use crate::error::{Result, SemgError};
use crate::recording::{Combo, RawRecording};
use crate::resolve::{get_trial, LabeledTrial};
use crate::segment::{segment_recording, SegmentMode, TrialMap};

/// Loader collaborator: where a subject lives and how to decode it.
pub trait RecordingSource {
    /// Storage path of `subject`'s recording; also the memo key.
    fn path(&self, subject: i32) -> PathBuf;

    /// Decode one recording per path, in the same order.
    fn load(&self, paths: &[PathBuf]) -> Result<Vec<RawRecording>>;
}

impl<S: RecordingSource + ?Sized> RecordingSource for &S {
    fn path(&self, subject: i32) -> PathBuf {
        (**self).path(subject)
    }

    fn load(&self, paths: &[PathBuf]) -> Result<Vec<RawRecording>> {
        (**self).load(paths)
    }
}

/// Memoizing, segmenting front end of a [`RecordingSource`].
pub struct TrialCache<S> {
    source: S,
    mode: SegmentMode,
    step: usize,
    memo: HashMap<PathBuf, Arc<TrialMap>>,
}

impl<S: RecordingSource> TrialCache<S> {
    /// Empty cache segmenting with `mode` and diff lag `step`.
    pub fn new(source: S, mode: SegmentMode, step: usize) -> Self {
        Self { source, mode, step, memo: HashMap::new() }
    }

    /// Segmentation mode and diff step taken from `cfg`.
    pub fn from_config(source: S, cfg: &DatasetConfig) -> Self {
        Self::new(source, cfg.mode(), cfg.step)
    }

    /// All trials of `subject`, loading and segmenting on first use.
    pub fn trials(&mut self, subject: i32) -> Result<Arc<TrialMap>> {
        let path = self.source.path(subject);
        if let Some(trials) = self.memo.get(&path) {
            return Ok(Arc::clone(trials));
        }

        debug!(subject, path = %path.display(), "load subject");
        let mut recordings = self.source.load(std::slice::from_ref(&path))?;
        if recordings.len() != 1 {
            return Err(SemgError::load(
                path,
                format!("source returned {} recordings for 1 path", recordings.len()),
            ));
        }
        let rec = recordings.remove(0);
        let trials = Arc::new(segment_recording(&rec, self.mode, self.step)?);
        debug!(subject, frames = rec.frames(), trials = trials.len(), "segmented");

        self.memo.insert(path, Arc::clone(&trials));
        Ok(trials)
    }

    /// Resolve one combo to its relabeled trial.
    pub fn get_trial(&mut self, combo: &Combo) -> Result<LabeledTrial> {
        let trials = self.trials(combo.subject)?;
        get_trial(&trials, combo)
    }

    /// Whether `subject` has already been loaded and segmented.
    pub fn contains(&self, subject: i32) -> bool {
        self.memo.contains_key(&self.source.path(subject))
    }

    /// Number of memoized subjects.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    /// `true` before the first subject is loaded.
    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Segmentation mode applied to every subject.
    pub fn mode(&self) -> SegmentMode {
        self.mode
    }

    /// Diff lag applied to every subject.
    pub fn step(&self) -> usize {
        self.step
    }

    /// The wrapped recording source.
    pub fn source(&self) -> &S {
        &self.source
    }
}

/// A [`TrialCache`] behind a mutex.
pub struct SharedTrialCache<S> {
    inner: Mutex<TrialCache<S>>,
}

impl<S: RecordingSource> SharedTrialCache<S> {
    /// Share `cache`; anything already memoized is kept.
    pub fn new(cache: TrialCache<S>) -> Self {
        Self { inner: Mutex::new(cache) }
    }

    /// [`TrialCache::trials`] under the lock, so concurrent first uses of
    /// a subject segment it once.
    pub fn trials(&self, subject: i32) -> Result<Arc<TrialMap>> {
        // A panic mid-load leaves the memo without that subject, which is
        // still consistent.
        let mut cache = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        cache.trials(subject)
    }

    pub fn get_trial(&self, combo: &Combo) -> Result<LabeledTrial> {
        let trials = self.trials(combo.subject)?;
        get_trial(&trials, combo)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unwrap the cache once sharing is over.
    pub fn into_inner(self) -> TrialCache<S> {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

/// Recordings already resident in memory, keyed by subject.
///
/// Counts calls to [`RecordingSource::load`] so callers can verify
/// memoization.
#[derive(Debug, Default)]
pub struct InMemorySource {
    recordings: HashMap<PathBuf, RawRecording>,
    loads: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `subject`'s recording, replacing any previous one.
    pub fn insert(&mut self, subject: i32, rec: RawRecording) {
        let path = self.path(subject);
        self.recordings.insert(path, rec);
    }

    /// Builder form of [`InMemorySource::insert`].
    pub fn with(mut self, subject: i32, rec: RawRecording) -> Self {
        self.insert(subject, rec);
        self
    }

    /// How many times `load` has been called.
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::Relaxed)
    }
}

impl RecordingSource for InMemorySource {
    fn path(&self, subject: i32) -> PathBuf {
        PathBuf::from(format!("memory/{subject:03}"))
    }

    fn load(&self, paths: &[PathBuf]) -> Result<Vec<RawRecording>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        paths
            .iter()
            .map(|p| {
                self.recordings
                    .get(p)
                    .cloned()
                    .ok_or_else(|| SemgError::load(p, "no such recording"))
            })
            .collect()
    }
}
