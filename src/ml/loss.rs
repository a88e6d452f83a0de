// ============================================================
// Layer 5 — Classification Loss
// ============================================================
// Anchor loss over per-class sigmoid probabilities.
//
// With p = sigmoid(logits), y the one-hot label and
// q* = p[true class] - slack (treated as a constant):
//
//   positive class:  -log(p)
//   negative class:  -(1 + p - q*)^γ · log(1 - p)
//
// Negatives that score close to (or above) the true class are
// weighted up. Summed over classes, averaged over the batch.
// log(p) and log(1 - p) are computed from the logits directly
// to stay finite for large magnitudes.

use burn::{prelude::*, tensor::activation::sigmoid};

/// A loss of one-hot labels and raw logits.
pub trait ClassificationLoss<B: Backend> {
    /// labels, logits: [batch, num_classes] → scalar [1]
    fn loss(&self, labels: Tensor<B, 2>, logits: Tensor<B, 2>) -> Tensor<B, 1>;
}

#[derive(Config, Debug)]
pub struct AnchorLossConfig {
    #[config(default = 0.5)]
    pub gamma: f64,
    #[config(default = 0.05)]
    pub slack: f64,
}

impl AnchorLossConfig {
    pub fn init(&self) -> AnchorLoss {
        AnchorLoss { gamma: self.gamma, slack: self.slack }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AnchorLoss {
    gamma: f64,
    slack: f64,
}

/// log(sigmoid(x)) = -(max(-x, 0) + log1p(exp(-|x|)))
fn log_sigmoid<B: Backend>(x: Tensor<B, 2>) -> Tensor<B, 2> {
    let softplus_neg = x.clone().neg().clamp_min(0.0) + x.abs().neg().exp().log1p();
    softplus_neg.neg()
}

impl<B: Backend> ClassificationLoss<B> for AnchorLoss {
    fn loss(&self, labels: Tensor<B, 2>, logits: Tensor<B, 2>) -> Tensor<B, 1> {
        let [batch, _] = logits.dims();
        let probs = sigmoid(logits.clone());

        let log_p        = log_sigmoid(logits.clone());
        let log_not_p    = log_sigmoid(logits.neg());
        let negatives    = labels.clone().neg().add_scalar(1.0);

        let anchor = (probs.clone() * labels.clone())
            .sum_dim(1)
            .sub_scalar(self.slack)
            .detach(); // [batch, 1]
        let weight = (probs - anchor).add_scalar(1.0).clamp_min(0.0).powf_scalar(self.gamma);

        let positive_term = labels * log_p;
        let negative_term = negatives * weight * log_not_p;

        (positive_term + negative_term)
            .sum()
            .neg()
            .div_scalar(batch as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn matrix(values: Vec<f32>, shape: [usize; 2]) -> Tensor<TestBackend, 2> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn value(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_data().iter::<f32>().next().unwrap()
    }

    #[test]
    fn test_confident_correct_prediction_has_lower_loss() {
        let loss   = AnchorLossConfig::new().init();
        let labels = matrix(vec![1.0, 0.0, 0.0], [1, 3]);

        let good = value(loss.loss(labels.clone(), matrix(vec![4.0, -4.0, -4.0], [1, 3])));
        let bad  = value(loss.loss(labels, matrix(vec![-4.0, 4.0, -4.0], [1, 3])));

        assert!(good > 0.0);
        assert!(good < bad, "good={good} bad={bad}");
    }

    #[test]
    fn test_zero_logits_with_zero_gamma() {
        // γ = 0 reduces to binary cross-entropy summed over classes:
        // every class contributes ln 2.
        let loss   = AnchorLossConfig::new().with_gamma(0.0).init();
        let labels = matrix(vec![0.0, 1.0, 0.0, 1.0], [2, 2]);
        let got    = value(loss.loss(labels, matrix(vec![0.0; 4], [2, 2])));
        assert!((got - 2.0 * std::f32::consts::LN_2).abs() < 1e-5, "{got}");
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let loss   = AnchorLossConfig::new().init();
        let labels = matrix(vec![0.0, 1.0], [1, 2]);
        let got    = value(loss.loss(labels, matrix(vec![200.0, -200.0], [1, 2])));
        assert!(got.is_finite());
    }
}
