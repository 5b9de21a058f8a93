use ndarray::{Array1, Array2, Array4};
use rand::RngCore;
use semg::iter::{DATA_NAMES, LABEL_NAMES};
use semg::{
    BalancePolicy, DataIter, Dataset, IterConfig, Label, LastBatch, SemgError, IGNORE,
};
use std::collections::HashMap;

/// `n` rows on a 1 × 3 grid; row `i` holds `i` in every cell.
fn dataset(gesture: &[i32]) -> Dataset {
    let n = gesture.len();
    Dataset {
        semg: Array4::from_shape_fn((n, 1, 1, 3), |(i, ..)| i as f32),
        diff: Array2::from_shape_fn((n, 3), |(i, c)| (i * 10 + c) as f32),
        gesture: Array1::from(gesture.to_vec()),
        subject: Array1::from_shape_fn(n, |i| (i % 2) as i32),
        segment: Array1::from_shape_fn(n, |i| i / 5),
        index: (0..n).collect(),
        num_gesture: gesture.iter().copied().max().map_or(0, |m| (m + 1) as usize),
        num_subject: 2,
    }
}

fn cycling_labels(n: usize, classes: i32) -> Vec<i32> {
    (0..n as i32).map(|i| i % classes).collect()
}

fn cfg(batch_size: usize) -> IterConfig {
    IterConfig { batch_size, ..IterConfig::default() }
}

#[test]
fn batches_carry_aligned_rows() {
    let it = DataIter::new(dataset(&cycling_labels(10, 3)), cfg(4)).unwrap();
    assert_eq!(it.num_batches(), 3);
    for b in it {
        assert_eq!(b.len(), 4);
        for (k, &row) in b.index.iter().enumerate() {
            assert_eq!(b.semg[[k, 0, 0, 2]], row as f32);
            assert_eq!(b.diff[[k, 1]], (row * 10 + 1) as f32);
            assert_eq!(b.subject[k], (row % 2) as i32);
            assert_eq!(b.segment[k], row / 5);
            assert_eq!(b.gesture[k], Label::Class(row % 3));
        }
    }
}

#[test]
fn last_batch_pad_and_discard() {
    let ds = dataset(&cycling_labels(10, 2));

    let batches: Vec<_> = DataIter::new(ds.clone(), cfg(4)).unwrap().collect();
    assert_eq!(batches.len(), 3);
    assert_eq!(batches[2].index, vec![8, 9, 0, 1]);
    assert_eq!(batches[2].pad, 2);
    assert!(batches[..2].iter().all(|b| b.pad == 0));

    let discard = IterConfig { last_batch: LastBatch::Discard, ..cfg(4) };
    let batches: Vec<_> = DataIter::new(ds, discard).unwrap().collect();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].index, vec![4, 5, 6, 7]);
}

#[test]
fn pad_larger_than_dataset_wraps_repeatedly() {
    let batches: Vec<_> = DataIter::new(dataset(&[0, 1, 0]), cfg(8)).unwrap().collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].index, vec![0, 1, 2, 0, 1, 2, 0, 1]);
    assert_eq!(batches[0].pad, 5);
}

#[test]
fn ignored_rows_surface_as_ignore_labels() {
    let it = DataIter::new(dataset(&[0, IGNORE, 1, IGNORE]), cfg(4)).unwrap();
    let b = it.into_iter().next().unwrap();
    assert_eq!(b.gesture, vec![Label::Class(0), Label::Ignore, Label::Class(1), Label::Ignore]);
    assert_eq!(b.gesture_raw().to_vec(), vec![0, -1, 1, -1]);
}

#[test]
fn seeded_shuffle_is_reproducible() {
    let ds = dataset(&cycling_labels(50, 5));
    let shuffled = |seed| IterConfig { shuffle: true, seed: Some(seed), ..cfg(7) };

    let a = DataIter::new(ds.clone(), shuffled(11)).unwrap();
    let b = DataIter::new(ds.clone(), shuffled(11)).unwrap();
    let c = DataIter::new(ds.clone(), shuffled(12)).unwrap();
    assert_eq!(a.order(), b.order());
    assert_ne!(a.order(), c.order());

    let mut sorted = a.order().to_vec();
    sorted.sort_unstable();
    assert_eq!(sorted, ds.index);

    let ia: Vec<_> = a.flat_map(|b| b.index).collect();
    let ib: Vec<_> = b.flat_map(|b| b.index).collect();
    assert_eq!(ia, ib);
}

#[test]
fn reset_restarts_the_epoch() {
    let mut it = DataIter::new(dataset(&cycling_labels(9, 3)), cfg(4)).unwrap();
    let first: Vec<_> = it.by_ref().map(|b| b.index).collect();
    assert!(it.next().is_none());

    it.reset();
    let second: Vec<_> = it.by_ref().map(|b| b.index).collect();
    assert_eq!(first, second);

    let shuffled = IterConfig { shuffle: true, seed: Some(3), ..cfg(4) };
    let mut it = DataIter::new(dataset(&cycling_labels(40, 4)), shuffled).unwrap();
    let epoch1 = it.order().to_vec();
    it.reset();
    let epoch2 = it.order().to_vec();
    assert_ne!(epoch1, epoch2);
    let mut sorted = epoch2;
    sorted.sort_unstable();
    assert_eq!(sorted, (0..40).collect::<Vec<_>>());
}

#[test]
fn balance_oversamples_minority_gestures() {
    let mut gesture = vec![0; 12];
    gesture.extend([1, 1, 1, 2, IGNORE, IGNORE]);
    let balanced = IterConfig { balance_gesture: true, seed: Some(5), ..cfg(6) };
    let it = DataIter::new(dataset(&gesture), balanced).unwrap();

    let mut counts: HashMap<i32, usize> = HashMap::new();
    for &row in it.order() {
        *counts.entry(it.dataset().gesture[row]).or_default() += 1;
    }
    assert_eq!(counts[&0], 12);
    assert_eq!(counts[&1], 12);
    assert_eq!(counts[&2], 12);
    assert_eq!(counts[&IGNORE], 2);
    assert_eq!(it.num_batches(), 38_usize.div_ceil(6));
}

struct Reverse;

impl BalancePolicy for Reverse {
    fn order(&self, index: &[usize], _: &Array1<i32>, _: &mut dyn RngCore) -> Vec<usize> {
        index.iter().rev().copied().collect()
    }
}

#[test]
fn custom_balance_policy() {
    let it = DataIter::new(dataset(&[0, 1, 2, 3]), cfg(2)).unwrap().with_balance(Reverse);
    let order: Vec<_> = it.flat_map(|b| b.index).collect();
    assert_eq!(order, vec![3, 2, 1, 0]);
}

#[test]
fn stream_descriptors() {
    let it = DataIter::new(dataset(&[0, 1]), cfg(16)).unwrap();
    assert_eq!(it.provide_data(), vec![(DATA_NAMES[0], vec![16, 1, 1, 3])]);
    assert_eq!(
        it.provide_label(),
        vec![
            ("gesture", vec![16]),
            ("diff", vec![16, 3]),
            ("subject", vec![16]),
            ("segment", vec![16]),
        ]
    );
    assert_eq!(LABEL_NAMES, ["gesture", "diff", "subject", "segment"]);
    assert_eq!(it.data_names(), &DATA_NAMES[..]);
    assert_eq!(it.label_names(), &LABEL_NAMES[..]);
    assert_eq!(it.batch_size(), 16);
    assert_eq!((it.num_gesture(), it.num_subject()), (2, 2));
}

#[test]
fn rejects_bad_inputs() {
    let err = DataIter::new(dataset(&[0, 1]), cfg(0)).unwrap_err();
    assert!(matches!(err, SemgError::InvalidConfig(_)));

    let mut empty = dataset(&[0, 1]);
    empty.index.clear();
    assert!(matches!(DataIter::new(empty, cfg(1)).unwrap_err(), SemgError::EmptyDataset));

    let mut skewed = dataset(&[0, 1, 2]);
    skewed.subject = Array1::zeros(2);
    assert!(matches!(
        DataIter::new(skewed, cfg(1)).unwrap_err(),
        SemgError::ShapeMismatch { what: "subject", .. }
    ));
}
