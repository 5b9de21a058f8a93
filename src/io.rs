//! Safetensors I/O.
//!
//! Recording files (`<root>/<subject:03>.safetensors`):
//!
//! ```text
//! semg     F32  [T, C]   raw signal, frames × channels
//! gesture  I32  [T]      per-frame gesture id, 0 = rest
//! ```
//!
//! Dataset files written by [`write_dataset`] hold `semg`, `diff` (F32),
//! `gesture`, `subject`, `segment`, `index` and the scalars `num_gesture`,
//! `num_subject` (I32).
use anyhow::{bail, ensure, Context, Result};
use ndarray::{s, Array1, Array2, ArrayViewD};
use std::collections::HashMap;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::assemble::Dataset;
use crate::cache::RecordingSource;
use crate::config::DatasetConfig;
use crate::error::SemgError;
use crate::preprocess::Preprocess;
use crate::recording::RawRecording;

// ── Reader ────────────────────────────────────────────────────────────────────

struct Entry {
    dtype: String,
    shape: Vec<usize>,
    begin: usize,
    end: usize,
}

fn parse_header(bytes: &[u8]) -> Result<(HashMap<String, serde_json::Value>, usize)> {
    ensure!(bytes.len() >= 8, "safetensors file too small");
    let mut len = [0u8; 8];
    len.copy_from_slice(&bytes[..8]);
    let n = u64::from_le_bytes(len) as usize;
    ensure!(bytes.len() >= 8 + n, "header length {n} exceeds file size");
    let header: HashMap<String, serde_json::Value> =
        serde_json::from_slice(&bytes[8..8 + n]).context("failed to parse safetensors header")?;
    Ok((header, 8 + n))
}

fn entry(header: &HashMap<String, serde_json::Value>, name: &str) -> Result<Entry> {
    let v = header.get(name).with_context(|| format!("missing '{name}' tensor"))?;
    let dtype = v["dtype"].as_str().context("tensor without dtype")?.to_string();
    let shape = v["shape"]
        .as_array()
        .context("tensor without shape")?
        .iter()
        .map(|d| d.as_u64().map(|d| d as usize).context("bad shape entry"))
        .collect::<Result<Vec<_>>>()?;
    let offsets = v["data_offsets"].as_array().context("tensor without data_offsets")?;
    ensure!(offsets.len() == 2, "data_offsets of '{name}' must have 2 entries");
    let begin = offsets[0].as_u64().context("bad offset")? as usize;
    let end = offsets[1].as_u64().context("bad offset")? as usize;
    Ok(Entry { dtype, shape, begin, end })
}

fn payload<'a>(bytes: &'a [u8], data_start: usize, e: &Entry, name: &str) -> Result<&'a [u8]> {
    let b = data_start.checked_add(e.begin);
    let en = data_start.checked_add(e.end);
    let (b, en) = b.zip(en).with_context(|| format!("'{name}' data offsets overflow"))?;
    ensure!(b <= en && en <= bytes.len(), "'{name}' data out of bounds");
    let nbytes = e
        .shape
        .iter()
        .try_fold(4usize, |acc, &d| acc.checked_mul(d))
        .with_context(|| format!("'{name}' shape {:?} overflows", e.shape))?;
    ensure!(en - b == nbytes, "'{name}' holds {} bytes for shape {:?}", en - b, e.shape);
    Ok(&bytes[b..en])
}

fn read_f32(bytes: &[u8], data_start: usize, e: &Entry, name: &str) -> Result<Vec<f32>> {
    if e.dtype != "F32" {
        bail!("'{name}' is {}, expected F32", e.dtype);
    }
    Ok(payload(bytes, data_start, e, name)?
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_i32(bytes: &[u8], data_start: usize, e: &Entry, name: &str) -> Result<Vec<i32>> {
    if e.dtype != "I32" {
        bail!("'{name}' is {}, expected I32", e.dtype);
    }
    Ok(payload(bytes, data_start, e, name)?
        .chunks_exact(4)
        .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Read one subject's recording.
pub fn read_recording(path: &Path) -> Result<RawRecording> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;

    let semg_entry = entry(&header, "semg")?;
    ensure!(semg_entry.shape.len() == 2, "'semg' must be [T, C], got {:?}", semg_entry.shape);
    let semg = read_f32(&bytes, data_start, &semg_entry, "semg")?;
    let signal = Array2::from_shape_vec((semg_entry.shape[0], semg_entry.shape[1]), semg)?;

    let gesture_entry = entry(&header, "gesture")?;
    ensure!(gesture_entry.shape.len() == 1, "'gesture' must be [T], got {:?}", gesture_entry.shape);
    let gesture = Array1::from(read_i32(&bytes, data_start, &gesture_entry, "gesture")?);

    Ok(RawRecording::new(signal, gesture)?)
}

/// [`RecordingSource`] over a directory of per-subject safetensors files.
#[derive(Debug, Clone)]
pub struct SafetensorsSource {
    root: PathBuf,
    preprocess: Preprocess,
}

impl SafetensorsSource {
    /// Source over `root` with no preprocessing.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), preprocess: Preprocess::None }
    }

    /// Source over `root` applying `cfg.preprocess`.
    pub fn from_config(root: impl Into<PathBuf>, cfg: &DatasetConfig) -> Self {
        Self::new(root).with_preprocess(cfg.preprocess)
    }

    /// Normalisation applied to every loaded signal.
    pub fn with_preprocess(mut self, preprocess: Preprocess) -> Self {
        self.preprocess = preprocess;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl RecordingSource for SafetensorsSource {
    fn path(&self, subject: i32) -> PathBuf {
        self.root.join(format!("{subject:03}.safetensors"))
    }

    fn load(&self, paths: &[PathBuf]) -> crate::error::Result<Vec<RawRecording>> {
        paths
            .iter()
            .map(|p| {
                let mut rec =
                    read_recording(p).map_err(|e| SemgError::load(p, format!("{e:#}")))?;
                self.preprocess.apply(rec.signal_mut());
                Ok(rec)
            })
            .collect()
    }
}

// ── Writer ────────────────────────────────────────────────────────────────────

/// A named array to serialize; dtype and shape come from the view.
pub enum Tensor<'a> {
    F32(ArrayViewD<'a, f32>),
    I32(ArrayViewD<'a, i32>),
}

impl Tensor<'_> {
    fn dtype(&self) -> &'static str {
        match self {
            Tensor::F32(_) => "F32",
            Tensor::I32(_) => "I32",
        }
    }

    fn shape(&self) -> &[usize] {
        match self {
            Tensor::F32(a) => a.shape(),
            Tensor::I32(a) => a.shape(),
        }
    }

    fn nbytes(&self) -> usize {
        4 * self.shape().iter().product::<usize>()
    }

    /// Little-endian, logical (row-major) order regardless of memory layout.
    fn write_le(&self, w: &mut impl Write) -> std::io::Result<()> {
        match self {
            Tensor::F32(a) => a.iter().try_for_each(|v| w.write_all(&v.to_le_bytes())),
            Tensor::I32(a) => a.iter().try_for_each(|v| w.write_all(&v.to_le_bytes())),
        }
    }
}

/// Write `tensors` to a safetensors file, in order.
///
/// ```rust,no_run
/// use ndarray::{arr1, arr2};
/// use semg::io::{write_tensors, Tensor};
///
/// let semg = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
/// let gesture = arr1(&[0, 1]);
/// write_tensors(
///     "/tmp/001.safetensors".as_ref(),
///     &[
///         ("semg", Tensor::F32(semg.view().into_dyn())),
///         ("gesture", Tensor::I32(gesture.view().into_dyn())),
///     ],
/// )
/// .unwrap();
/// ```
pub fn write_tensors(path: &Path, tensors: &[(&str, Tensor<'_>)]) -> Result<()> {
    let mut header = serde_json::Map::new();
    let mut offset = 0usize;
    for (name, t) in tensors {
        ensure!(!header.contains_key(*name), "duplicate tensor '{name}'");
        let end = offset + t.nbytes();
        header.insert(
            name.to_string(),
            serde_json::json!({ "dtype": t.dtype(), "shape": t.shape(), "data_offsets": [offset, end] }),
        );
        offset = end;
    }
    let mut header = serde_json::to_vec(&header)?;
    // Pad with spaces so the payload starts 8-byte aligned.
    header.resize(header.len().next_multiple_of(8), b' ');

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    w.write_all(&(header.len() as u64).to_le_bytes())?;
    w.write_all(&header)?;
    for (_, t) in tensors {
        t.write_le(&mut w)?;
    }
    w.flush()?;
    Ok(())
}

/// Write a recording in the layout [`read_recording`] expects.
pub fn write_recording(rec: &RawRecording, path: &Path) -> Result<()> {
    write_tensors(
        path,
        &[
            ("semg", Tensor::F32(rec.signal().view().into_dyn())),
            ("gesture", Tensor::I32(rec.gesture_ids().view().into_dyn())),
        ],
    )
}

fn as_i32(values: impl IntoIterator<Item = usize>, what: &str) -> Result<Array1<i32>> {
    values
        .into_iter()
        .map(|x| i32::try_from(x).with_context(|| format!("{what} value {x} does not fit in I32")))
        .collect()
}

/// Write every stream of an assembled dataset. Row positions and class
/// counts are stored as I32.
pub fn write_dataset(ds: &Dataset, path: &Path) -> Result<()> {
    let segment = as_i32(ds.segment.iter().copied(), "segment")?;
    let index = as_i32(ds.index.iter().copied(), "index")?;
    let counts = as_i32([ds.num_gesture, ds.num_subject], "class count")?;

    write_tensors(
        path,
        &[
            ("semg", Tensor::F32(ds.semg.view().into_dyn())),
            ("diff", Tensor::F32(ds.diff.view().into_dyn())),
            ("gesture", Tensor::I32(ds.gesture.view().into_dyn())),
            ("subject", Tensor::I32(ds.subject.view().into_dyn())),
            ("segment", Tensor::I32(segment.view().into_dyn())),
            ("index", Tensor::I32(index.view().into_dyn())),
            ("num_gesture", Tensor::I32(counts.slice(s![..1]).into_dyn())),
            ("num_subject", Tensor::I32(counts.slice(s![1..]).into_dyn())),
        ],
    )
}

/// Read back the I32 streams of a dataset file, keyed by name.
pub fn read_dataset_labels(path: &Path) -> Result<HashMap<String, Vec<i32>>> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let (header, data_start) = parse_header(&bytes)?;
    let mut out = HashMap::new();
    for name in ["gesture", "subject", "segment", "index", "num_gesture", "num_subject"] {
        let e = entry(&header, name)?;
        out.insert(name.to_string(), read_i32(&bytes, data_start, &e, name)?);
    }
    Ok(out)
}
