// ============================================================
// Layer 4 — Point Cloud Batcher
// ============================================================
// Converts parsed clouds into tensors and feeds the training loop
// one batch at a time.
//
// How batching works here:
//   Input:  N PointClouds, each with P points
//   Output: points [N, P, 3] and one-hot labels [N, C]
//
// BatchStream walks a file list in fixed-size chunks and drops
// the final partial chunk, so every batch has exactly
// `batch_size` rows. The files of one chunk are parsed in
// parallel with rayon; results keep the file order and the next
// batch is only produced when the loop asks for it.

use anyhow::{ensure, Result};
use burn::prelude::*;
use rayon::prelude::*;

use crate::data::loader::load_point_cloud;
use crate::domain::point_cloud::{LabeledFile, PointCloud, ScoreMatrix};

// ─── PointCloudBatch ──────────────────────────────────────────────────────────
/// A batch of point clouds ready for the model forward pass.
#[derive(Debug, Clone)]
pub struct PointCloudBatch<B: Backend> {
    /// xyz coordinates, shape [batch_size, num_points, 3]
    pub points: Tensor<B, 3>,

    /// One-hot labels, shape [batch_size, num_classes]
    pub labels: Tensor<B, 2>,

    /// Host copy of `labels` for the metric counters
    pub label_matrix: ScoreMatrix,
}

// ─── PointCloudBatcher ────────────────────────────────────────────────────────
/// Holds the target device so tensors are created on the correct GPU/CPU.
#[derive(Clone, Debug)]
pub struct PointCloudBatcher<B: Backend> {
    pub device:      B::Device,
    pub num_classes: usize,
}

impl<B: Backend> PointCloudBatcher<B> {
    pub fn new(device: B::Device, num_classes: usize) -> Self {
        Self { device, num_classes }
    }

    /// Stack clouds of equal size into one batch.
    pub fn batch(&self, clouds: Vec<PointCloud>) -> Result<PointCloudBatch<B>> {
        ensure!(!clouds.is_empty(), "cannot build a batch from zero point clouds");
        let batch_size = clouds.len();
        let num_points = clouds[0].num_points();
        ensure!(
            clouds.iter().all(|c| c.points.len() == num_points * 3),
            "point clouds in one batch must all have {num_points} points"
        );

        let labels: Vec<usize> = clouds.iter().map(|c| c.label).collect();
        let label_matrix = ScoreMatrix::one_hot(&labels, self.num_classes)?;

        let flat: Vec<f32> = clouds.into_iter().flat_map(|c| c.points).collect();
        let points = Tensor::<B, 3>::from_data(
            TensorData::new(flat, [batch_size, num_points, 3]),
            &self.device,
        );
        let labels = Tensor::<B, 2>::from_data(
            TensorData::new(label_matrix.values().to_vec(), [batch_size, self.num_classes]),
            &self.device,
        );

        Ok(PointCloudBatch { points, labels, label_matrix })
    }
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// Sequential, drop-remainder stream of batches over a file list.
pub struct BatchStream<B: Backend> {
    files:      Vec<LabeledFile>,
    batch_size: usize,
    num_points: usize,
    batcher:    PointCloudBatcher<B>,
    cursor:     usize,
}

impl<B: Backend> BatchStream<B> {
    pub fn new(
        files:      Vec<LabeledFile>,
        batch_size: usize,
        num_points: usize,
        batcher:    PointCloudBatcher<B>,
    ) -> Self {
        Self { files, batch_size: batch_size.max(1), num_points, batcher, cursor: 0 }
    }

    /// Number of full batches this stream yields.
    pub fn num_batches(&self) -> usize {
        self.files.len() / self.batch_size
    }
}

impl<B: Backend> Iterator for BatchStream<B> {
    type Item = Result<PointCloudBatch<B>>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.cursor + self.batch_size;
        if end > self.files.len() {
            return None;
        }
        let chunk = &self.files[self.cursor..end];
        self.cursor = end;

        let num_points = self.num_points;
        let clouds: Result<Vec<PointCloud>> = chunk
            .par_iter()
            .map(|file| load_point_cloud(file, num_points))
            .collect();

        Some(clouds.and_then(|clouds| self.batcher.batch(clouds)))
    }
}
