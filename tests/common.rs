//! Shared helpers for building synthetic recordings.
use ndarray::{Array1, Array2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use semg::{InMemorySource, RawRecording};

#[allow(unused)]
/// Gesture ids from run-length pairs: `[(0, 3), (2, 4)]` → `0 0 0 2 2 2 2`.
pub fn ids_from_runs(runs: &[(i32, usize)]) -> Array1<i32> {
    runs.iter()
        .flat_map(|&(g, n)| std::iter::repeat(g).take(n))
        .collect()
}

#[allow(unused)]
/// `[T, C]` signal where frame `t`, channel `c` holds `t * 100 + c`.
pub fn ramp_signal(frames: usize, channels: usize) -> Array2<f32> {
    Array2::from_shape_fn((frames, channels), |(t, c)| (t * 100 + c) as f32)
}

#[allow(unused)]
pub fn recording(runs: &[(i32, usize)], channels: usize) -> RawRecording {
    let ids = ids_from_runs(runs);
    RawRecording::new(ramp_signal(ids.len(), channels), ids).unwrap()
}

#[allow(unused)]
/// Rest / gesture protocol: each gesture in `gestures` is performed `reps`
/// times, each repetition `active` frames long and separated by `rest`
/// rest frames.
pub fn protocol(gestures: &[i32], reps: usize, active: usize, rest: usize) -> Vec<(i32, usize)> {
    let mut runs = vec![(0, rest)];
    for &g in gestures {
        for _ in 0..reps {
            runs.push((g, active));
            runs.push((0, rest));
        }
    }
    runs
}

#[allow(unused)]
/// Random gesture-id sequence in `-1..=max_gesture` built from runs of
/// length 1..=max_run, deterministic in `seed`.
pub fn random_ids(seed: u64, frames: usize, max_gesture: i32, max_run: usize) -> Array1<i32> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut out = Vec::with_capacity(frames);
    while out.len() < frames {
        let g = rng.gen_range(-1..=max_gesture);
        let n = rng.gen_range(1..=max_run).min(frames - out.len());
        out.extend(std::iter::repeat(g).take(n));
    }
    Array1::from(out)
}

#[allow(unused)]
/// In-memory source with one protocol recording per subject.
pub fn source(subjects: &[i32], gestures: &[i32], reps: usize, channels: usize) -> InMemorySource {
    let mut src = InMemorySource::new();
    for &s in subjects {
        src.insert(s, recording(&protocol(gestures, reps, 6 + s as usize, 4), channels));
    }
    src
}
