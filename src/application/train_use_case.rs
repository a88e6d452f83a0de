// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates a full training run in order:
//
//   Step 1: Index the dataset           (Layer 4 - data)
//   Step 2: Split train/validation      (Layer 4 - data)
//   Step 3: Create the run directory    (Layer 6 - infra)
//   Step 4: Save config                 (Layer 6 - infra)
//   Step 5: Pick the experiment tracker (Layer 6 - infra)
//   Step 6: Run the epoch loop          (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use std::path::PathBuf;

use anyhow::{ensure, Result};
use burn::backend::{
    ndarray::NdArrayDevice,
    wgpu::WgpuDevice,
    Autodiff, NdArray, Wgpu,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{dataset::ModelNetIndex, splitter::split_train_val};
use crate::domain::{
    schedule::LearningRateSchedule,
    traits::{ExperimentTracker, NoopTracker},
};
use crate::infra::{
    checkpoint::{run_timestamp, CheckpointManager},
    tracking::JsonlTracker,
};
use crate::ml::trainer::{run_training, EpochSummary};

/// Device family the run trains on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeBackend {
    NdArray,
    Wgpu,
}

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters of a run. Written to the run directory as
// JSON so a checkpoint can always be traced back to its settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub batch_size:     usize,
    pub epochs:         usize,
    pub learning_rate:  f64,
    pub lr_decay_steps: u64,
    pub lr_decay_rate:  f64,
    pub lr_staircase:   bool,
    pub lr_warm_up:     bool,
    pub track:          bool,
    pub data_dir:       PathBuf,
    pub checkpoint_dir: PathBuf,
    pub num_points:     usize,
    pub num_classes:    usize,
    pub val_fraction:   f64,
    pub seed:           u64,
    pub backend:        ComputeBackend,
    pub resume:         Option<PathBuf>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            batch_size:     32,
            epochs:         200,
            learning_rate:  1e-3,
            lr_decay_steps: 7000,
            lr_decay_rate:  0.7,
            lr_staircase:   false,
            lr_warm_up:     true,
            track:          true,
            data_dir:       PathBuf::from("ModelNet40"),
            checkpoint_dir: PathBuf::from("model/checkpoints"),
            num_points:     1024,
            num_classes:    40,
            val_fraction:   0.2,
            seed:           0,
            backend:        ComputeBackend::Wgpu,
            resume:         None,
        }
    }
}

impl TrainConfig {
    /// Optional warm-up plus exponential decay from `learning_rate`.
    pub fn lr_schedule(&self) -> LearningRateSchedule {
        LearningRateSchedule::new(self.learning_rate)
            .with_decay(self.lr_decay_steps, self.lr_decay_rate)
            .with_staircase(self.lr_staircase)
            .with_warm_up(self.lr_warm_up)
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "--batch-size must be at least 1");
        ensure!(self.num_points > 0, "--num-points must be at least 1");
        ensure!(self.num_classes > 0, "--num-classes must be at least 1");
        ensure!(
            (0.0..1.0).contains(&self.val_fraction),
            "--val-fraction must lie in [0, 1), got {}",
            self.val_fraction
        );
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training run end to end.
    pub fn execute(&self) -> Result<Vec<EpochSummary>> {
        let cfg = &self.config;
        cfg.validate()?;

        // ── Step 1: Index <class>/{train,test}/*.npy ──────────────────────────
        let index = ModelNetIndex::scan(&cfg.data_dir)?;
        ensure!(
            index.num_classes() <= cfg.num_classes,
            "dataset has {} classes but the model only predicts {}",
            index.num_classes(),
            cfg.num_classes
        );
        if index.num_classes() < cfg.num_classes {
            tracing::warn!(
                "Dataset has {} classes, model is built for {}",
                index.num_classes(),
                cfg.num_classes
            );
        }

        // ── Step 2: Train / validation split ──────────────────────────────────
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let (train_files, val_files) =
            split_train_val(index.train, 1.0 - cfg.val_fraction, &mut rng);
        tracing::info!(
            "Split: {} train, {} validation ({} test files not used)",
            train_files.len(),
            val_files.len(),
            index.test.len()
        );

        // ── Step 3 + 4: Run directory and config ──────────────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.checkpoint_dir, &run_timestamp())?;
        ckpt_manager.save_config(cfg)?;
        tracing::info!("Run directory: '{}'", ckpt_manager.run_dir().display());

        // ── Step 5: Tracker ───────────────────────────────────────────────────
        let tracker: Box<dyn ExperimentTracker> = if cfg.track {
            let jsonl = JsonlTracker::new(ckpt_manager.run_dir())?;
            tracing::info!("Tracking metrics in '{}'", jsonl.path().display());
            Box::new(jsonl)
        } else {
            Box::new(NoopTracker)
        };

        // ── Step 6: Epoch loop (Layer 5) ──────────────────────────────────────
        match cfg.backend {
            ComputeBackend::Wgpu => run_training::<Autodiff<Wgpu>>(
                cfg, train_files, val_files, ckpt_manager, tracker, WgpuDevice::default(),
            ),
            ComputeBackend::NdArray => run_training::<Autodiff<NdArray>>(
                cfg, train_files, val_files, ckpt_manager, tracker, NdArrayDevice::Cpu,
            ),
        }
    }
}
