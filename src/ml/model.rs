// ============================================================
// Layer 5 — PointNet Classifier
// ============================================================
// points [B, N, 3]
//   → input transform  (T-Net, 3×3)       points · T1
//   → shared MLP 64, 64
//   → feature transform (T-Net, 64×64)    features · T2
//   → shared MLP 64, 128, 1024
//   → max pool over points                [B, 1024]
//   → FC 512, 256 (+ dropout)
//   → FC num_classes                      logits [B, C]
//
// "Shared MLP" layers are Linear layers applied to the last
// dimension of [B, N, C] tensors, each followed by batch norm
// and ReLU. The feature transform contributes the auxiliary loss
//
//   reg_weight * mean_b ‖T2 T2ᵀ − I‖²
//
// pushing T2 towards an orthogonal matrix.

use burn::{
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig, Relu},
    prelude::*,
};

use crate::ml::batch_norm::{ScheduledBatchNorm, ScheduledBatchNormConfig};
use crate::ml::classifier::{ClassifierOutput, ForwardMode, PointCloudClassifier};

const INPUT_DIMS: usize = 3;
const POINT_FEATURES: [usize; 2] = [64, 64];
const GLOBAL_FEATURES: [usize; 3] = [64, 128, 1024];
const HEAD_FEATURES: [usize; 2] = [512, 256];

// ─── Dense block ──────────────────────────────────────────────────────────────

#[derive(Module, Debug)]
pub struct DenseBlock<B: Backend> {
    pub linear:     Linear<B>,
    pub norm:       ScheduledBatchNorm<B>,
    pub activation: Relu,
}

impl<B: Backend> DenseBlock<B> {
    fn new(d_in: usize, d_out: usize, device: &B::Device) -> Self {
        Self {
            linear:     LinearConfig::new(d_in, d_out).init(device),
            norm:       ScheduledBatchNormConfig::new(d_out).init(device),
            activation: Relu::new(),
        }
    }

    pub fn forward<const D: usize>(&self, x: Tensor<B, D>, mode: ForwardMode) -> Tensor<B, D> {
        self.activation.forward(self.norm.forward(self.linear.forward(x), mode))
    }
}

fn dense_stack<B: Backend>(d_in: usize, widths: &[usize], device: &B::Device) -> Vec<DenseBlock<B>> {
    let mut blocks = Vec::with_capacity(widths.len());
    let mut d = d_in;
    for &w in widths {
        blocks.push(DenseBlock::new(d, w, device));
        d = w;
    }
    blocks
}

/// [B, N, F] → [B, F], max over points.
/// Reduced along the last axis: the ndarray backward pass only scatters there.
fn max_pool<B: Backend>(x: Tensor<B, 3>) -> Tensor<B, 2> {
    let [batch, _, features] = x.dims();
    x.swap_dims(1, 2).max_dim(2).reshape([batch, features])
}

fn identity<B: Backend>(k: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut eye = vec![0.0f32; k * k];
    for i in 0..k {
        eye[i * k + i] = 1.0;
    }
    Tensor::from_data(TensorData::new(eye, [k, k]), device)
}

// ─── Transform net ────────────────────────────────────────────────────────────

/// Predicts a k×k alignment matrix from a [B, N, k] input.
#[derive(Module, Debug)]
pub struct TransformNet<B: Backend> {
    pub point_mlp: Vec<DenseBlock<B>>,
    pub head:      Vec<DenseBlock<B>>,
    pub out:       Linear<B>,
    pub k:         usize,
}

impl<B: Backend> TransformNet<B> {
    fn new(k: usize, device: &B::Device) -> Self {
        // Zero weights and zero bias: the net starts out predicting the identity.
        let out = LinearConfig::new(HEAD_FEATURES[1], k * k)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self {
            point_mlp: dense_stack(k, &GLOBAL_FEATURES, device),
            head:      dense_stack(GLOBAL_FEATURES[2], &HEAD_FEATURES, device),
            out,
            k,
        }
    }

    pub fn forward(&self, x: Tensor<B, 3>, mode: ForwardMode) -> Tensor<B, 3> {
        let [batch, _, _] = x.dims();
        let device = x.device();

        let mut h = x;
        for block in &self.point_mlp {
            h = block.forward(h, mode);
        }
        let mut g = max_pool(h);
        for block in &self.head {
            g = block.forward(g, mode);
        }

        let k = self.k;
        let eye = identity::<B>(k, &device).reshape([1, k, k]).expand([batch, k, k]);
        self.out.forward(g).reshape([batch, k, k]) + eye
    }
}

// ─── PointNet ─────────────────────────────────────────────────────────────────

#[derive(Config, Debug)]
pub struct PointNetConfig {
    #[config(default = 40)]
    pub num_classes: usize,
    #[config(default = 0.3)]
    pub dropout: f64,
    #[config(default = 0.001)]
    pub reg_weight: f64,
}

impl PointNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> PointNet<B> {
        PointNet {
            input_transform:   TransformNet::new(INPUT_DIMS, device),
            point_mlp:         dense_stack(INPUT_DIMS, &POINT_FEATURES, device),
            feature_transform: TransformNet::new(POINT_FEATURES[1], device),
            global_mlp:        dense_stack(POINT_FEATURES[1], &GLOBAL_FEATURES, device),
            head:              dense_stack(GLOBAL_FEATURES[2], &HEAD_FEATURES, device),
            dropout:           DropoutConfig::new(self.dropout).init(),
            classifier:        LinearConfig::new(HEAD_FEATURES[1], self.num_classes).init(device),
            reg_weight:        self.reg_weight,
        }
    }
}

#[derive(Module, Debug)]
pub struct PointNet<B: Backend> {
    pub input_transform:   TransformNet<B>,
    pub point_mlp:         Vec<DenseBlock<B>>,
    pub feature_transform: TransformNet<B>,
    pub global_mlp:        Vec<DenseBlock<B>>,
    pub head:              Vec<DenseBlock<B>>,
    pub dropout:           Dropout,
    pub classifier:        Linear<B>,
    pub reg_weight:        f64,
}

impl<B: Backend> PointNet<B> {
    /// reg_weight * mean over the batch of ‖T Tᵀ − I‖².
    pub fn orthogonality_loss(&self, transform: Tensor<B, 3>) -> Tensor<B, 1> {
        let [batch, k, _] = transform.dims();
        let eye = identity::<B>(k, &transform.device())
            .reshape([1, k, k])
            .expand([batch, k, k]);
        let gram = transform.clone().matmul(transform.transpose());
        (gram - eye)
            .powf_scalar(2.0)
            .sum()
            .mul_scalar(self.reg_weight / batch as f64)
    }
}

impl<B: Backend> PointCloudClassifier<B> for PointNet<B> {
    fn forward(&self, points: Tensor<B, 3>, mode: ForwardMode) -> ClassifierOutput<B> {
        let input_t = self.input_transform.forward(points.clone(), mode);
        let mut x = points.matmul(input_t);

        for block in &self.point_mlp {
            x = block.forward(x, mode);
        }

        let feature_t = self.feature_transform.forward(x.clone(), mode);
        let reg_loss  = self.orthogonality_loss(feature_t.clone());
        x = x.matmul(feature_t);

        for block in &self.global_mlp {
            x = block.forward(x, mode);
        }

        let mut g = max_pool(x);
        for block in &self.head {
            g = block.forward(g, mode);
            if mode.is_train() {
                g = self.dropout.forward(g);
            }
        }

        ClassifierOutput {
            logits:     self.classifier.forward(g),
            aux_losses: vec![reg_loss],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};
    use burn::module::AutodiffModule;

    type TestBackend = NdArray;

    fn scalar<B: Backend>(t: Tensor<B, 1>) -> f32 {
        t.into_data().iter::<f32>().next().unwrap()
    }

    #[test]
    fn test_forward_shapes() {
        let device = Default::default();
        let model  = PointNetConfig::new().init::<TestBackend>(&device);
        let points = Tensor::<TestBackend, 3>::random(
            [2, 16, 3],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        );

        let out = model.forward(points.clone(), ForwardMode::Train { bn_momentum: 0.5 });
        assert_eq!(out.logits.dims(), [2, 40]);
        assert_eq!(out.aux_losses.len(), 1);

        let out = model.forward(points, ForwardMode::Eval);
        assert_eq!(out.logits.dims(), [2, 40]);
    }

    #[test]
    fn test_transform_nets_start_as_identity() {
        let device = Default::default();
        let model  = PointNetConfig::new().with_num_classes(4).init::<TestBackend>(&device);
        let points = Tensor::<TestBackend, 3>::ones([2, 8, 3], &device);

        let t = model.input_transform.forward(points, ForwardMode::Eval);
        let values: Vec<f32> = t.into_data().iter::<f32>().collect();
        let expected = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        for (got, want) in values.iter().zip(expected.iter().cycle()) {
            assert!((got - want).abs() < 1e-6);
        }
    }

    #[test]
    fn test_orthogonality_loss() {
        let device = Default::default();
        let model  = PointNetConfig::new().with_reg_weight(1.0).init::<TestBackend>(&device);

        let eye = identity::<TestBackend>(3, &device).reshape([1, 3, 3]);
        assert!(scalar(model.orthogonality_loss(eye.clone())).abs() < 1e-6);

        // 2·I → T Tᵀ − I = 3·I → 9 * 3 = 27
        assert!((scalar(model.orthogonality_loss(eye.mul_scalar(2.0))) - 27.0).abs() < 1e-4);
    }

    #[test]
    fn test_max_pool_takes_per_feature_maximum() {
        let device = Default::default();
        // two points, three features
        let x = Tensor::<TestBackend, 3>::from_data(
            TensorData::new(vec![1.0f32, 5.0, -2.0, 4.0, 0.0, -1.0], [1, 2, 3]),
            &device,
        );
        let pooled: Vec<f32> = max_pool(x).into_data().iter::<f32>().collect();
        assert_eq!(pooled, vec![4.0, 5.0, -1.0]);
    }

    #[test]
    fn test_pooling_backward_on_ndarray() {
        let device = Default::default();
        let x = Tensor::<Autodiff<TestBackend>, 3>::random(
            [2, 4, 5],
            burn::tensor::Distribution::Uniform(-1.0, 1.0),
            &device,
        )
        .require_grad();
        let grads = max_pool(x.clone()).sum().backward();
        let grad  = x.grad(&grads).unwrap();
        // one winning point per (batch, feature)
        let total: f32 = grad.into_data().iter::<f32>().sum();
        assert!((total - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_valid_model_runs_on_inner_backend() {
        let device = Default::default();
        let model  = PointNetConfig::new().with_num_classes(5).init::<Autodiff<TestBackend>>(&device);
        let valid  = model.valid();
        let points = Tensor::<TestBackend, 3>::zeros([3, 8, 3], &device);
        let out    = valid.forward(points, ForwardMode::Eval);
        assert_eq!(out.logits.dims(), [3, 5]);
    }
}
