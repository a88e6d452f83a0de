// ============================================================
// Layer 5 — Classifier Contract
// ============================================================
// What the training loop needs from a model: a forward pass
// that takes the batch-norm momentum as an argument and hands
// back logits together with any regularisation losses it
// produced along the way.

use burn::prelude::*;

/// How a forward pass should treat normalization and dropout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ForwardMode {
    /// Batch statistics are used and folded into the running
    /// statistics with the given momentum; dropout is active.
    Train { bn_momentum: f64 },
    /// Running statistics are used; dropout is the identity.
    Eval,
}

impl ForwardMode {
    pub fn is_train(&self) -> bool {
        matches!(self, ForwardMode::Train { .. })
    }
}

/// Logits plus auxiliary losses from one forward pass.
pub struct ClassifierOutput<B: Backend> {
    /// Raw class scores, shape [batch_size, num_classes]
    pub logits: Tensor<B, 2>,

    /// Regularisation terms added to the primary loss, in model order
    pub aux_losses: Vec<Tensor<B, 1>>,
}

/// A model mapping a batch of point clouds to class logits.
pub trait PointCloudClassifier<B: Backend> {
    /// points: [batch, num_points, 3] → logits: [batch, num_classes]
    fn forward(&self, points: Tensor<B, 3>, mode: ForwardMode) -> ClassifierOutput<B>;
}
