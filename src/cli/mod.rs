// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses the flags with
// clap and hands a TrainConfig to Layer 2 (application).
//
//   pointnet-train --data-dir ModelNet40 --epochs 200 --batch-size 32
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::TrainArgs;

use crate::application::train_use_case::TrainUseCase;

#[derive(Parser, Debug)]
#[command(
    name = "pointnet-train",
    version,
    about = "Train a PointNet classifier on ModelNet point clouds."
)]
pub struct Cli {
    #[command(flatten)]
    pub train: TrainArgs,
}

impl Cli {
    /// Convert the flags into a config and run training.
    pub fn run(self) -> Result<()> {
        tracing::info!("Starting training on point clouds in: {}", self.train.data_dir.display());

        let summaries = TrainUseCase::new(self.train.into()).execute()?;

        match summaries.last() {
            Some(last) => println!(
                "Training complete. Last checkpoint: {}",
                last.checkpoint.display()
            ),
            None => println!("Training complete. No epochs were run."),
        }
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::train_use_case::{ComputeBackend, TrainConfig};
    use std::path::PathBuf;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["pointnet-train"]).unwrap();
        let cfg: TrainConfig = cli.train.into();

        assert_eq!(cfg.batch_size, 32);
        assert_eq!(cfg.epochs, 200);
        assert_eq!(cfg.learning_rate, 1e-3);
        assert_eq!(cfg.lr_decay_steps, 7000);
        assert_eq!(cfg.lr_decay_rate, 0.7);
        assert!(!cfg.lr_staircase);
        assert!(cfg.lr_warm_up);
        assert!(cfg.track);
        assert_eq!(cfg.data_dir, PathBuf::from("ModelNet40"));
        assert_eq!(cfg.checkpoint_dir, PathBuf::from("model/checkpoints"));
        assert_eq!(cfg.num_points, 1024);
        assert_eq!(cfg.num_classes, 40);
        assert_eq!(cfg.val_fraction, 0.2);
        assert_eq!(cfg.seed, 0);
        assert_eq!(cfg.backend, ComputeBackend::Wgpu);
        assert!(cfg.resume.is_none());
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "pointnet-train",
            "--batch-size", "8",
            "--learning-rate", "0.01",
            "--track", "false",
            "--backend", "ndarray",
            "--resume", "runs/x/iter-40.mpk",
        ])
        .unwrap();
        let cfg: TrainConfig = cli.train.into();

        assert_eq!(cfg.batch_size, 8);
        assert_eq!(cfg.learning_rate, 0.01);
        assert!(!cfg.track);
        assert_eq!(cfg.backend, ComputeBackend::NdArray);
        assert_eq!(cfg.resume, Some(PathBuf::from("runs/x/iter-40.mpk")));
    }

    #[test]
    fn test_rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["pointnet-train", "--backend", "cuda"]).is_err());
    }
}
