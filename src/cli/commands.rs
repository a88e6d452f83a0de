// ============================================================
// Layer 1 — CLI Arguments
// ============================================================
// Every flag of a training run. clap's derive macros generate
// help text, error messages for bad values and conversion from
// strings to numbers and enums.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{ArgAction, Args, ValueEnum};

use crate::application::train_use_case::{ComputeBackend, TrainConfig};

/// Where tensors live during training.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    /// CPU via ndarray
    Ndarray,
    /// GPU via wgpu
    Wgpu,
}

impl From<BackendArg> for ComputeBackend {
    fn from(b: BackendArg) -> Self {
        match b {
            BackendArg::Ndarray => ComputeBackend::NdArray,
            BackendArg::Wgpu    => ComputeBackend::Wgpu,
        }
    }
}

/// All arguments of a training run.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Number of point clouds per training step
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Number of full passes over the training files
    #[arg(long, default_value_t = 200)]
    pub epochs: usize,

    /// Peak learning rate, reached after warm-up and then decayed
    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Steps over which the learning rate shrinks by --lr-decay-rate
    #[arg(long, default_value_t = 7000)]
    pub lr_decay_steps: u64,

    #[arg(long, default_value_t = 0.7)]
    pub lr_decay_rate: f64,

    /// Decay in whole intervals instead of continuously
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    pub lr_staircase: bool,

    /// Ramp the learning rate up from 0 over the first 2000 steps
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub lr_warm_up: bool,

    /// Record per-step and per-epoch metrics in the run directory
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub track: bool,

    /// Dataset root with <class>/{train,test}/*.npy
    #[arg(long, default_value = "ModelNet40")]
    pub data_dir: PathBuf,

    /// Parent of the timestamped run directories
    #[arg(long, default_value = "model/checkpoints")]
    pub checkpoint_dir: PathBuf,

    /// Points kept from every cloud
    #[arg(long, default_value_t = 1024)]
    pub num_points: usize,

    /// Width of the classifier output
    #[arg(long, default_value_t = 40)]
    pub num_classes: usize,

    /// Share of the training files held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    /// Seed for the split, the per-epoch shuffles and weight init
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    #[arg(long, value_enum, default_value_t = BackendArg::Wgpu)]
    pub backend: BackendArg,

    /// Continue from a checkpoint file named iter-<step>.mpk
    #[arg(long)]
    pub resume: Option<PathBuf>,
}

/// Boundary between Layer 1 and Layer 2:
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            batch_size:     a.batch_size,
            epochs:         a.epochs,
            learning_rate:  a.learning_rate,
            lr_decay_steps: a.lr_decay_steps,
            lr_decay_rate:  a.lr_decay_rate,
            lr_staircase:   a.lr_staircase,
            lr_warm_up:     a.lr_warm_up,
            track:          a.track,
            data_dir:       a.data_dir,
            checkpoint_dir: a.checkpoint_dir,
            num_points:     a.num_points,
            num_classes:    a.num_classes,
            val_fraction:   a.val_fraction,
            seed:           a.seed,
            backend:        a.backend.into(),
            resume:         a.resume,
        }
    }
}
