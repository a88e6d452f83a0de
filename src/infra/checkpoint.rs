// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights in full precision with Burn's
// named MessagePack file recorder.
//
// File naming convention:
//   model/checkpoints/
//     20260304_1215/            ← UTC start time of the run
//       train_config.json       ← hyper-parameters of the run
//       iter-1230.mpk           ← weights after the epoch ending at step 1230
//       iter-2460.mpk
//       ...
//
// Every epoch writes a new file; older checkpoints are never
// removed. The batch-norm momentum is not part of any record:
// the trainer passes it to the model on every forward call.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Recorder for every checkpoint: f32 parameters, uncompressed.
pub type CheckpointRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

/// Extension the recorder appends to every checkpoint path.
pub const CHECKPOINT_EXTENSION: &str = "mpk";

const CHECKPOINT_PREFIX: &str = "iter-";

/// Run identifier derived from the UTC start time, e.g. `20260304_1215`.
pub fn run_timestamp() -> String {
    format_timestamp(Utc::now())
}

pub fn format_timestamp(time: DateTime<Utc>) -> String {
    time.format("%Y%m%d_%H%M").to_string()
}

/// Global step encoded in a checkpoint file name such as `iter-1230.mpk`.
pub fn checkpoint_step(path: &Path) -> Result<u64> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("'{}' has no file name", path.display()))?;
    let Some(rest) = name.strip_prefix(CHECKPOINT_PREFIX) else {
        bail!("'{}' is not named {CHECKPOINT_PREFIX}<step>", path.display());
    };
    let digits = rest.split('.').next().unwrap_or_default();
    digits
        .parse::<u64>()
        .with_context(|| format!("cannot read a global step from '{}'", path.display()))
}

/// Manages saving and loading of checkpoints for one run.
pub struct CheckpointManager {
    /// `<root>/<timestamp>`
    run_dir: PathBuf,
}

impl CheckpointManager {
    /// Create the run directory `<root>/<timestamp>` (like `mkdir -p`).
    pub fn new(root: impl AsRef<Path>, timestamp: &str) -> Result<Self> {
        let run_dir = root.as_ref().join(timestamp);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Cannot create checkpoint directory '{}'", run_dir.display()))?;
        Ok(Self { run_dir })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Path of the artifact written for `step`, including the recorder's extension.
    pub fn checkpoint_path(&self, step: u64) -> PathBuf {
        self.run_dir
            .join(format!("{CHECKPOINT_PREFIX}{step}"))
            .with_extension(CHECKPOINT_EXTENSION)
    }

    /// Save the full parameter record of `model` under the given global step.
    ///
    /// The write is synchronous; a failure aborts the caller's epoch.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, step: u64) -> Result<PathBuf> {
        let base = self.run_dir.join(format!("{CHECKPOINT_PREFIX}{step}"));

        model
            .clone()
            .save_file(base.clone(), &CheckpointRecorder::new())
            .with_context(|| format!("Failed to save checkpoint to '{}'", base.display()))?;

        let path = self.checkpoint_path(step);
        tracing::debug!("Saved checkpoint '{}'", path.display());
        Ok(path)
    }

    /// Load weights from a checkpoint written by `save_model`.
    ///
    /// `path` may be given with or without the recorder's extension.
    /// The model must have the architecture the checkpoint was saved with.
    pub fn load_model<B: Backend, M: Module<B>>(
        path:   &Path,
        model:  M,
        device: &B::Device,
    ) -> Result<M> {
        let base = strip_checkpoint_extension(path);

        tracing::info!("Loading checkpoint '{}'", base.display());

        model
            .load_file(base.clone(), &CheckpointRecorder::new(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", base.display()))
    }

    /// Save the run configuration as pretty JSON next to the checkpoints.
    pub fn save_config<C: Serialize>(&self, cfg: &C) -> Result<PathBuf> {
        let path = self.run_dir.join("train_config.json");

        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(path)
    }
}

fn strip_checkpoint_extension(path: &Path) -> PathBuf {
    let suffix = format!(".{CHECKPOINT_EXTENSION}");
    match path.to_str().and_then(|s| s.strip_suffix(&suffix)) {
        Some(stripped) => PathBuf::from(stripped),
        None           => path.to_path_buf(),
    }
}
