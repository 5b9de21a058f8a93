use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use semg::{
    io::{write_dataset, SafetensorsSource},
    Combo, Dataset, DatasetConfig, Preprocess, SemiDownsample, TrialCache,
};

#[derive(Parser, Debug)]
#[command(name = "assemble", version, about = "Assemble an sEMG gesture dataset from per-subject recordings")]
struct Args {
    /// Directory holding <subject:03>.safetensors recordings
    #[arg(long, value_name = "DIR")]
    root: PathBuf,

    /// Output dataset .safetensors path
    #[arg(long, value_name = "FILE")]
    output: PathBuf,

    /// JSON DatasetConfig; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Subjects, e.g. "2,4,6" or "1-27"
    #[arg(long)]
    subjects: String,

    /// Gesture ids, e.g. "1-8"
    #[arg(long)]
    gestures: String,

    /// Repetitions, e.g. "1-10"
    #[arg(long, default_value = "1-10")]
    trials: String,

    /// Temporal diff lag in frames
    #[arg(long)]
    step: Option<usize>,

    /// Drop rest frames instead of attaching them to the next trial
    #[arg(long, default_value_t = false)]
    norest: bool,

    /// Fraction in (0, 1) or integer stride >= 1
    #[arg(long)]
    semi_downsample: Option<f64>,

    /// Upsample kept rows under a stride policy
    #[arg(long, default_value_t = false)]
    semi_downsample_keep: bool,

    /// Electrode grid rows
    #[arg(long)]
    rows: Option<usize>,

    /// Electrode grid columns
    #[arg(long)]
    cols: Option<usize>,

    /// none | zscore_global | zscore_channel
    #[arg(long)]
    preprocess: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// Parse "1,3,5-8" into [1, 3, 5, 6, 7, 8].
fn parse_ids(spec: &str) -> Result<Vec<i64>> {
    let mut out = Vec::new();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((a, b)) => {
                let a: i64 = a.trim().parse().with_context(|| format!("bad range start in {part:?}"))?;
                let b: i64 = b.trim().parse().with_context(|| format!("bad range end in {part:?}"))?;
                if a > b {
                    bail!("empty range {part:?}");
                }
                out.extend(a..=b);
            }
            None => out.push(part.parse().with_context(|| format!("bad id {part:?}"))?),
        }
    }
    if out.is_empty() {
        bail!("no ids in {spec:?}");
    }
    Ok(out)
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = args
        .log_level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .unwrap_or(tracing_subscriber::filter::LevelFilter::INFO);
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    let mut cfg = match &args.config {
        Some(path) => DatasetConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => DatasetConfig::default(),
    };
    if let Some(step) = args.step {
        cfg.step = step;
    }
    if args.norest {
        cfg.norest = true;
    }
    if let Some(v) = args.semi_downsample {
        cfg.semi_downsample = Some(SemiDownsample::try_from(v)?);
    }
    if args.semi_downsample_keep {
        cfg.semi_downsample_keep = true;
    }
    if let Some(r) = args.rows {
        cfg.num_semg_row = r;
    }
    if let Some(c) = args.cols {
        cfg.num_semg_col = c;
    }
    if let Some(p) = &args.preprocess {
        cfg.preprocess = serde_json::from_value::<Preprocess>(serde_json::Value::String(p.clone()))
            .with_context(|| format!("unknown preprocess {p:?}"))?;
    }
    cfg.validate()?;
    info!("Config: {cfg:?}");

    let subjects = parse_ids(&args.subjects)?;
    let gestures = parse_ids(&args.gestures)?;
    let trials = parse_ids(&args.trials)?;
    let mut combos = Vec::with_capacity(subjects.len() * gestures.len() * trials.len());
    for &s in &subjects {
        for &g in &gestures {
            for &t in &trials {
                combos.push(Combo::new(
                    i32::try_from(s).context("subject out of range")?,
                    i32::try_from(g).context("gesture out of range")?,
                    u32::try_from(t).context("trial out of range")?,
                ));
            }
        }
    }
    info!("Requested {} combos", combos.len());

    let source = SafetensorsSource::from_config(&args.root, &cfg);
    let mut cache = TrialCache::from_config(source, &cfg);
    let ds = Dataset::build(&combos, &mut cache, &cfg)?;
    info!(
        "Assembled {} rows ({} ignored) · {} gestures · {} subjects",
        ds.len(),
        ds.num_ignored(),
        ds.num_gesture,
        ds.num_subject
    );

    write_dataset(&ds, &args.output)?;
    info!("Written → {}", args.output.display());
    Ok(())
}
