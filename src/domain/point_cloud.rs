// ============================================================
// Layer 3 — Point Cloud Domain Types
// ============================================================
// A training sample starts life as a file path with a class
// index, becomes a flat buffer of xyz coordinates once parsed,
// and its predictions come back as a [batch, num_classes]
// score matrix on the host.

use std::path::PathBuf;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

/// One point-cloud file on disk together with its class index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledFile {
    pub path:  PathBuf,
    pub label: usize,
}

impl LabeledFile {
    pub fn new(path: impl Into<PathBuf>, label: usize) -> Self {
        Self { path: path.into(), label }
    }
}

/// A parsed point cloud.
///
/// `points` is row major: `[x0, y0, z0, x1, y1, z1, ...]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloud {
    pub points: Vec<f32>,
    pub label:  usize,
}

impl PointCloud {
    pub fn new(points: Vec<f32>, label: usize) -> Self {
        Self { points, label }
    }

    pub fn num_points(&self) -> usize {
        self.points.len() / 3
    }
}

/// A dense row-major `[rows, cols]` matrix of `f32` scores.
///
/// Used at the boundary between tensors and the metric counters,
/// both for one-hot labels and for raw logits.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreMatrix {
    rows:   usize,
    cols:   usize,
    values: Vec<f32>,
}

impl ScoreMatrix {
    pub fn new(rows: usize, cols: usize, values: Vec<f32>) -> Result<Self> {
        ensure!(
            rows * cols == values.len(),
            "score matrix of shape [{rows}, {cols}] needs {} values, got {}",
            rows * cols,
            values.len()
        );
        Ok(Self { rows, cols, values })
    }

    /// Build a one-hot matrix with `cols` classes from class indices.
    pub fn one_hot(labels: &[usize], cols: usize) -> Result<Self> {
        let mut values = vec![0.0f32; labels.len() * cols];
        for (row, &label) in labels.iter().enumerate() {
            ensure!(label < cols, "label {label} is out of range for {cols} classes");
            values[row * cols + label] = 1.0;
        }
        Self::new(labels.len(), cols, values)
    }

    pub fn rows(&self) -> usize { self.rows }

    pub fn cols(&self) -> usize { self.cols }

    pub fn values(&self) -> &[f32] { &self.values }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.cols..(index + 1) * self.cols]
    }

    /// Element-wise logistic sigmoid.
    pub fn sigmoid(&self) -> Self {
        let values = self.values.iter().map(|&v| 1.0 / (1.0 + (-v).exp())).collect();
        Self { rows: self.rows, cols: self.cols, values }
    }

    /// Index of the largest value in each row; ties resolve to the lowest index.
    pub fn argmax_rows(&self) -> Vec<usize> {
        (0..self.rows)
            .map(|r| {
                self.row(r)
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                        if v > best.1 { (i, v) } else { best }
                    })
                    .0
            })
            .collect()
    }

    /// Hard one-hot assignment of every row's argmax.
    pub fn argmax_one_hot(&self) -> Self {
        let mut values = vec![0.0f32; self.values.len()];
        for (row, idx) in self.argmax_rows().into_iter().enumerate() {
            values[row * self.cols + idx] = 1.0;
        }
        Self { rows: self.rows, cols: self.cols, values }
    }
}
