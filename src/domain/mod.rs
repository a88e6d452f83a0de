// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and pure functions that describe a training
// run, independent of any tensor library:
//
//   point_cloud.rs  labelled files, parsed clouds, score matrices
//   schedule.rs     learning-rate and batch-norm momentum schedules
//   metrics.rs      running accuracy / precision / recall counters
//   traits.rs       the experiment-tracking seam
//
// Rules for this layer:
//   - NO Burn framework types allowed here
//   - NO file I/O
//   - Only plain Rust structs, enums, functions and traits

pub mod point_cloud;

pub mod schedule;

pub mod metrics;

pub mod traits;
