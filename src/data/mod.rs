// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything from a ModelNet40 directory tree to tensor batches.
//
//   ModelNet40/<class>/{train,test}/*.npy
//       │
//       ▼
//   ModelNetIndex     → discovers classes and labelled files
//       │
//       ▼
//   split_train_val   → disjoint training / validation files
//       │
//       ▼
//   BatchStream       → fixed-size chunks, remainder dropped,
//       │               files of a chunk parsed in parallel
//       ▼
//   PointCloudBatcher → stacks clouds into [batch, points, 3]
//                       and one-hot labels into [batch, classes]

/// Walks the dataset directory and assigns class indices
pub mod dataset;

/// Parses a single .npy point cloud
pub mod loader;

/// Builds tensor batches and the per-epoch batch stream
pub mod batcher;

/// Shuffles and splits files into train/validation sets
pub mod splitter;
