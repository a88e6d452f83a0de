// ============================================================
// Layer 5 — Batch Normalization with Scheduled Momentum
// ============================================================
// Normalizes the last dimension of its input. Unlike a layer with
// a fixed momentum, the momentum arrives with every training
// forward pass, so the schedule lives with the trainer and is
// never part of the saved record.
//
// Running statistics follow the smoothing convention
//
//   running = momentum * running + (1 - momentum) * batch
//
// so a momentum close to 1 makes the statistics adapt slowly.

use burn::{
    module::{Param, RunningState},
    prelude::*,
};

use crate::ml::classifier::ForwardMode;

#[derive(Config, Debug)]
pub struct ScheduledBatchNormConfig {
    pub num_features: usize,
    #[config(default = 1e-3)]
    pub epsilon: f64,
}

impl ScheduledBatchNormConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ScheduledBatchNorm<B> {
        let n = self.num_features;
        ScheduledBatchNorm {
            gamma:        Param::from_tensor(Tensor::ones([n], device)),
            beta:         Param::from_tensor(Tensor::zeros([n], device)),
            running_mean: RunningState::new(Tensor::zeros([n], device)),
            running_var:  RunningState::new(Tensor::ones([n], device)),
            epsilon:      self.epsilon,
        }
    }
}

#[derive(Module, Debug)]
pub struct ScheduledBatchNorm<B: Backend> {
    pub gamma:    Param<Tensor<B, 1>>,
    pub beta:     Param<Tensor<B, 1>>,
    running_mean: RunningState<Tensor<B, 1>>,
    running_var:  RunningState<Tensor<B, 1>>,
    epsilon:      f64,
}

impl<B: Backend> ScheduledBatchNorm<B> {
    /// x: [..., features] → same shape.
    pub fn forward<const D: usize>(&self, x: Tensor<B, D>, mode: ForwardMode) -> Tensor<B, D> {
        let dims     = x.dims();
        let features = dims[D - 1];
        let rows     = dims.iter().take(D - 1).product::<usize>();

        let flat: Tensor<B, 2> = x.reshape([rows, features]);
        let out = match mode {
            ForwardMode::Train { bn_momentum } => self.forward_train(flat, bn_momentum),
            ForwardMode::Eval                  => self.forward_eval(flat),
        };
        out.reshape(dims)
    }

    fn forward_train(&self, x: Tensor<B, 2>, momentum: f64) -> Tensor<B, 2> {
        let [_, features] = x.dims();

        let mean     = x.clone().mean_dim(0); // [1, features]
        let centered = x - mean.clone();
        let var      = centered.clone().powf_scalar(2.0).mean_dim(0);

        let running_mean = self.running_mean.value_sync();
        let running_var  = self.running_var.value_sync();
        self.running_mean.update(
            running_mean
                .mul_scalar(momentum)
                .add(mean.detach().reshape([features]).mul_scalar(1.0 - momentum))
                .detach(),
        );
        self.running_var.update(
            running_var
                .mul_scalar(momentum)
                .add(var.clone().detach().reshape([features]).mul_scalar(1.0 - momentum))
                .detach(),
        );

        self.scale_shift(centered / var.add_scalar(self.epsilon).sqrt())
    }

    fn forward_eval(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let [_, features] = x.dims();
        let mean = self.running_mean.value().reshape([1, features]);
        let var  = self.running_var.value().reshape([1, features]);
        self.scale_shift((x - mean) / var.add_scalar(self.epsilon).sqrt())
    }

    fn scale_shift(&self, normalized: Tensor<B, 2>) -> Tensor<B, 2> {
        let [_, features] = normalized.dims();
        normalized * self.gamma.val().reshape([1, features])
            + self.beta.val().reshape([1, features])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn values<const D: usize>(t: Tensor<TestBackend, D>) -> Vec<f32> {
        t.into_data().iter::<f32>().collect()
    }

    fn input(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2> {
        // feature means: 2.0 and 10.0, biased variances: 1.0 and 4.0
        Tensor::from_data(TensorData::new(vec![1.0f32, 8.0, 3.0, 12.0], [2, 2]), device)
    }

    #[test]
    fn test_running_stats_use_momentum_as_smoothing() {
        let device = Default::default();
        let norm   = ScheduledBatchNormConfig::new(2).init::<TestBackend>(&device);

        norm.forward(input(&device), ForwardMode::Train { bn_momentum: 0.75 });

        let mean = values(norm.running_mean.value_sync());
        let var  = values(norm.running_var.value_sync());
        // 0.75 * 0 + 0.25 * batch_mean
        assert!((mean[0] - 0.5).abs() < 1e-6);
        assert!((mean[1] - 2.5).abs() < 1e-6);
        // 0.75 * 1 + 0.25 * batch_var
        assert!((var[0] - 1.0).abs() < 1e-6);
        assert!((var[1] - 1.75).abs() < 1e-6);
    }

    #[test]
    fn test_consecutive_updates_compound() {
        let device = Default::default();
        let norm   = ScheduledBatchNormConfig::new(2).init::<TestBackend>(&device);

        norm.forward(input(&device), ForwardMode::Train { bn_momentum: 0.5 });
        norm.forward(input(&device), ForwardMode::Train { bn_momentum: 0.5 });

        // 0 → 0.5 * 2 = 1.0 → 0.5 * 1 + 0.5 * 2 = 1.5
        let mean = values(norm.running_mean.value_sync());
        assert!((mean[0] - 1.5).abs() < 1e-6, "{mean:?}");
        assert!((mean[1] - 7.5).abs() < 1e-6, "{mean:?}");
    }

    #[test]
    fn test_train_output_is_normalized() {
        let device = Default::default();
        let norm   = ScheduledBatchNormConfig::new(2).with_epsilon(0.0).init::<TestBackend>(&device);

        let out = values(norm.forward(input(&device), ForwardMode::Train { bn_momentum: 0.5 }));
        let expected = [-1.0f32, -1.0, 1.0, 1.0];
        for (o, e) in out.iter().zip(expected) {
            assert!((o - e).abs() < 1e-5, "{out:?}");
        }
    }

    #[test]
    fn test_eval_does_not_touch_running_stats() {
        let device = Default::default();
        let norm   = ScheduledBatchNormConfig::new(2).with_epsilon(0.0).init::<TestBackend>(&device);

        // Fresh running stats are mean 0, var 1: eval is the identity.
        let out = values(norm.forward(input(&device), ForwardMode::Eval));
        assert_eq!(out, vec![1.0, 8.0, 3.0, 12.0]);
        assert_eq!(values(norm.running_mean.value_sync()), vec![0.0, 0.0]);
        assert_eq!(values(norm.running_var.value_sync()), vec![1.0, 1.0]);
    }

    #[test]
    fn test_rank_three_input_keeps_shape() {
        let device = Default::default();
        let norm   = ScheduledBatchNormConfig::new(4).init::<TestBackend>(&device);
        let x      = Tensor::<TestBackend, 3>::ones([2, 5, 4], &device);
        let out    = norm.forward(x, ForwardMode::Train { bn_momentum: 0.9 });
        assert_eq!(out.dims(), [2, 5, 4]);
    }
}
