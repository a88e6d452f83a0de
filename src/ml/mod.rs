// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// Everything that builds, differentiates or updates a network
// lives here.
//
//   classifier.rs   the seam between trainer and network:
//                   forward(points, mode) → logits + aux losses
//
//   batch_norm.rs   batch norm whose momentum is supplied on
//                   every training forward pass
//
//   model.rs        PointNet: input/feature T-Nets, shared
//                   MLPs, max pooling, dense head
//
//   loss.rs         anchor loss over sigmoid probabilities
//
//   trainer.rs      train step, validation step and the epoch
//                   loop that owns step, schedules, metrics
//                   and checkpoints
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Qi et al. (2017) PointNet

/// Forward-mode flag and classifier trait
pub mod classifier;

/// Batch normalization with externally scheduled momentum
pub mod batch_norm;

/// PointNet architecture
pub mod model;

/// Anchor loss
pub mod loss;

/// Training loop with validation and checkpointing
pub mod trainer;
