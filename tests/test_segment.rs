mod common;
use common::{ids_from_runs, ramp_signal, random_ids};
use ndarray::arr2;
use semg::segment::{breaks, segment, temporal_diff, SegmentMode};
use semg::SemgError;
use std::collections::HashMap;

const MODES: [SegmentMode; 2] = [SegmentMode::NoRest, SegmentMode::RestIncluded];

#[test]
fn norest_never_emits_background_trials() {
    for seed in 0..50 {
        let ids = random_ids(seed, 300, 5, 12);
        let x = ramp_signal(ids.len(), 2);
        let trials = segment(x.view(), ids.view(), SegmentMode::NoRest, 1).unwrap();
        for (key, t) in &trials {
            assert!(key.gesture > 0, "seed {seed}: trial {key:?}");
            assert!(ids[t.end - 1] > 0);
            assert!(t.gesture.iter().all(|&g| g == key.gesture));
        }
    }
}

#[test]
fn trials_and_background_partition_the_recording() {
    for seed in 0..50 {
        let ids = random_ids(seed, 257, 4, 9);
        let n = ids.len();
        let x = ramp_signal(n, 1);
        for mode in MODES {
            let trials = match segment(x.view(), ids.view(), mode, 1) {
                Ok(t) => t,
                // Rest-included cannot close a gesture that never returns to
                // exactly 0 before the end.
                Err(SemgError::EmptySegment { .. }) if mode == SegmentMode::RestIncluded => continue,
                Err(e) => panic!("seed {seed}: {e}"),
            };

            let mut owner = vec![None; n];
            for (key, t) in &trials {
                for slot in &mut owner[t.begin..t.end] {
                    assert!(slot.is_none(), "seed {seed} {mode:?}: overlap at {key:?}");
                    *slot = Some(*key);
                }
            }
            // Every frame outside a trial is background in NoRest mode.
            if mode == SegmentMode::NoRest {
                for (i, slot) in owner.iter().enumerate() {
                    if slot.is_none() {
                        assert!(ids[i] <= 0, "seed {seed}: active frame {i} dropped");
                    }
                }
            }

            // The boundary ranges, plus the head and tail outside them,
            // tile [0, n) exactly.
            let b = breaks(ids.view(), mode);
            let mut covered = b.first().copied().unwrap_or(n);
            for w in b.windows(2) {
                assert_eq!(w[0], covered);
                assert!(w[1] > w[0]);
                covered = w[1];
            }
            assert!(covered <= n);
            let tail_background = ids.iter().skip(covered).all(|&g| g <= 0)
                || mode == SegmentMode::RestIncluded;
            assert!(tail_background, "seed {seed} {mode:?}");
        }
    }
}

#[test]
fn repetitions_count_up_from_one() {
    for seed in 0..30 {
        let ids = random_ids(seed, 400, 3, 15);
        let x = ramp_signal(ids.len(), 1);
        let trials = segment(x.view(), ids.view(), SegmentMode::NoRest, 1).unwrap();

        let mut last: HashMap<i32, (u32, usize)> = HashMap::new();
        let mut by_begin: Vec<_> = trials.iter().collect();
        by_begin.sort_by_key(|(_, t)| t.begin);
        for (key, t) in by_begin {
            let expected = last.get(&key.gesture).map_or(1, |(r, _)| r + 1);
            assert_eq!(key.repetition, expected, "seed {seed}");
            if let Some((_, prev_end)) = last.get(&key.gesture) {
                assert!(t.begin >= *prev_end);
            }
            last.insert(key.gesture, (key.repetition, t.end));
        }
    }
}

#[test]
fn diff_matches_lagged_difference() {
    let x = arr2(&[[1.0_f32], [3.0], [6.0]]);
    assert_eq!(temporal_diff(x.view(), 1), arr2(&[[0.0_f32], [2.0], [3.0]]));

    let x = ramp_signal(40, 3);
    for step in [1, 2, 5, 39, 40, 41] {
        let d = temporal_diff(x.view(), step);
        assert_eq!(d.dim(), x.dim());
        for t in 0..40 {
            for c in 0..3 {
                let expected = if t >= step { x[[t, c]] - x[[t - step, c]] } else { 0.0 };
                approx::assert_abs_diff_eq!(d[[t, c]], expected, epsilon = 1e-6_f32);
            }
        }
    }
}

#[test]
fn trial_streams_are_aligned() {
    let ids = ids_from_runs(&[(0, 5), (1, 7), (0, 3), (2, 4), (0, 2), (1, 6)]);
    let x = ramp_signal(ids.len(), 4);
    for mode in MODES {
        for (_, t) in segment(x.view(), ids.view(), mode, 3).unwrap() {
            assert_eq!(t.semg.nrows(), t.len());
            assert_eq!(t.diff.dim(), t.semg.dim());
            assert_eq!(t.gesture.len(), t.len());
            assert_eq!(t.semg.row(0), x.row(t.begin));
        }
    }
}

#[test]
fn rest_included_spans_previous_rest() {
    let ids = ids_from_runs(&[(0, 5), (1, 7), (0, 3), (2, 4), (0, 2), (1, 6)]);
    let x = ramp_signal(ids.len(), 1);
    let trials = segment(x.view(), ids.view(), SegmentMode::RestIncluded, 1).unwrap();
    let spans: Vec<_> = trials.values().map(|t| (t.begin, t.end)).collect();
    // BTreeMap order: (1,1), (1,2), (2,1)
    assert_eq!(spans, vec![(0, 12), (19, 27), (12, 19)]);
}
