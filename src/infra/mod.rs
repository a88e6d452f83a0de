// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Side effects the training loop depends on but does not own:
//
//   checkpoint.rs   run directory, model weights per epoch
//                   (full-precision MessagePack) and the run's
//                   config as JSON
//
//   tracking.rs     experiment tracker that appends step and
//                   epoch records to a JSON-lines file in the
//                   run directory
//
// Reference: Rust Book §9 (Error Handling with anyhow)
//            Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// JSON-lines experiment tracker
pub mod tracking;
