// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Single-threaded orchestration of one run:
//
//   for epoch in 0..epochs
//     reset train/val accumulators
//     for batch in train batches            (delivery order)
//       train_step(lr, momentum)            → logits, loss, reg loss
//       update train accumulators
//       track {time, lr, loss, reg loss, momentum} at global step
//       global step += 1; recompute momentum and lr
//     for batch in val batches
//       valid_step                          → logits
//       update val accumulators
//     checkpoint at <run>/iter-<global step>
//     track six accumulator results at global step
//
// The trainer is the only owner of the global step, learning
// rate and momentum; train_step is the only place parameters
// change. Validation runs on `model.valid()` (the inner backend,
// no autodiff, no dropout).

use std::{marker::PhantomData, path::PathBuf, time::Instant};

use anyhow::Result;
use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;

use crate::application::train_use_case::TrainConfig;
use crate::data::batcher::{BatchStream, PointCloudBatch, PointCloudBatcher};
use crate::domain::{
    metrics::{MetricSummary, SplitMetrics},
    point_cloud::{LabeledFile, ScoreMatrix},
    schedule::{LearningRateSchedule, ScheduleState},
    traits::ExperimentTracker,
};
use crate::infra::checkpoint::{checkpoint_step, CheckpointManager};
use crate::ml::{
    classifier::{ForwardMode, PointCloudClassifier},
    loss::{AnchorLossConfig, ClassificationLoss},
    model::PointNetConfig,
};

// ─── Single steps ─────────────────────────────────────────────────────────────

/// Result of one training step.
pub struct TrainStepOutput<B: Backend> {
    /// Detached logits, shape [batch_size, num_classes]
    pub logits: Tensor<B, 2>,
    /// Primary loss plus every auxiliary loss
    pub loss: f64,
    /// First auxiliary loss, 0.0 when the model emits none
    pub reg_loss: f64,
}

fn scalar<B: Backend>(t: Tensor<B, 1>) -> f64 {
    t.into_scalar().elem::<f64>()
}

fn score_matrix<B: Backend>(logits: Tensor<B, 2>) -> Result<ScoreMatrix> {
    let [rows, cols] = logits.dims();
    ScoreMatrix::new(rows, cols, logits.into_data().iter::<f32>().collect())
}

/// Forward, loss, backward and one optimizer update on a single batch.
///
/// Takes the model by value and returns the updated one, so the only
/// parameter mutation in a run happens here.
pub fn train_step<B, M, O, L>(
    model:         M,
    optim:         &mut O,
    loss_fn:       &L,
    batch:         &PointCloudBatch<B>,
    learning_rate: f64,
    bn_momentum:   f64,
) -> (M, TrainStepOutput<B>)
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PointCloudClassifier<B>,
    O: Optimizer<M, B>,
    L: ClassificationLoss<B>,
{
    let output = model.forward(batch.points.clone(), ForwardMode::Train { bn_momentum });

    let reg_loss = output
        .aux_losses
        .first()
        .map(|aux| scalar(aux.clone()))
        .unwrap_or(0.0);

    let loss = output
        .aux_losses
        .into_iter()
        .fold(loss_fn.loss(batch.labels.clone(), output.logits.clone()), |acc, aux| acc + aux);
    let loss_value = scalar(loss.clone());

    // Backward pass + optimizer update
    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let model = optim.step(learning_rate, model, grads);

    let out = TrainStepOutput { logits: output.logits.detach(), loss: loss_value, reg_loss };
    (model, out)
}

/// Inference-mode forward pass. Never touches parameters or running statistics.
pub fn valid_step<B: Backend, M: PointCloudClassifier<B>>(model: &M, points: Tensor<B, 3>) -> Tensor<B, 2> {
    model.forward(points, ForwardMode::Eval).logits
}

// ─── Trainer ──────────────────────────────────────────────────────────────────

/// What one finished epoch produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpochSummary {
    pub epoch:       usize,
    pub global_step: u64,
    pub train:       MetricSummary,
    pub val:         MetricSummary,
    pub checkpoint:  PathBuf,
}

pub struct Trainer<B, M, O, L> {
    model:         M,
    optim:         O,
    loss_fn:       L,
    lr_schedule:   LearningRateSchedule,
    schedule:      ScheduleState,
    train_metrics: SplitMetrics,
    val_metrics:   SplitMetrics,
    checkpoints:   CheckpointManager,
    tracker:       Box<dyn ExperimentTracker>,
    _backend:      PhantomData<B>,
}

impl<B, M, O, L> Trainer<B, M, O, L>
where
    B: AutodiffBackend,
    M: AutodiffModule<B> + PointCloudClassifier<B>,
    M::InnerModule: PointCloudClassifier<B::InnerBackend>,
    O: Optimizer<M, B>,
    L: ClassificationLoss<B>,
{
    pub fn new(
        model:       M,
        optim:       O,
        loss_fn:     L,
        lr_schedule: LearningRateSchedule,
        num_classes: usize,
        checkpoints: CheckpointManager,
        tracker:     Box<dyn ExperimentTracker>,
    ) -> Self {
        Self {
            model,
            optim,
            loss_fn,
            lr_schedule,
            schedule:      ScheduleState::initial(&lr_schedule),
            train_metrics: SplitMetrics::new(num_classes),
            val_metrics:   SplitMetrics::new(num_classes),
            checkpoints,
            tracker,
            _backend:      PhantomData,
        }
    }

    /// Continue a run whose last checkpoint was written at `global_step`.
    /// Both schedules are recomputed from the step.
    pub fn resume_at(mut self, global_step: u64) -> Self {
        self.schedule = ScheduleState::at(global_step, &self.lr_schedule);
        self
    }

    pub fn schedule(&self) -> ScheduleState { self.schedule }

    pub fn reset_metrics(&mut self) {
        self.train_metrics.reset();
        self.val_metrics.reset();
    }

    /// Run every training batch in delivery order. Returns the number of steps taken.
    pub fn train_epoch<I>(&mut self, batches: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<PointCloudBatch<B>>>,
    {
        let mut steps = 0usize;
        for batch in batches {
            let batch = batch?;
            let tic   = Instant::now();

            let (model, out) = train_step(
                self.model.clone(),
                &mut self.optim,
                &self.loss_fn,
                &batch,
                self.schedule.learning_rate,
                self.schedule.bn_momentum,
            );
            self.model = model;

            self.train_metrics.update(&batch.label_matrix, &score_matrix(out.logits)?)?;

            if self.tracker.is_enabled() {
                self.tracker.log(self.schedule.global_step, &[
                    ("time_per_step", tic.elapsed().as_secs_f64()),
                    ("learning_rate", self.schedule.learning_rate),
                    ("training_loss", out.loss),
                    ("mat_reg_loss",  out.reg_loss),
                    ("bn_momentum",   self.schedule.bn_momentum),
                ])?;
            }
            tracing::debug!(
                "step {} | loss={:.4} | reg={:.4} | lr={:.3e} | bn_momentum={:.4}",
                self.schedule.global_step,
                out.loss,
                out.reg_loss,
                self.schedule.learning_rate,
                self.schedule.bn_momentum,
            );

            self.schedule.advance(&self.lr_schedule);
            steps += 1;
        }
        Ok(steps)
    }

    /// Run every validation batch. Leaves step, schedules and parameters untouched.
    pub fn validate_epoch<I>(&mut self, batches: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<PointCloudBatch<B::InnerBackend>>>,
    {
        // model.valid() → M::InnerModule on B::InnerBackend
        let model_valid = self.model.valid();

        let mut seen = 0usize;
        for batch in batches {
            let batch  = batch?;
            let logits = valid_step(&model_valid, batch.points.clone());
            self.val_metrics.update(&batch.label_matrix, &score_matrix(logits)?)?;
            seen += 1;
        }
        Ok(seen)
    }

    /// Write the epoch checkpoint and report accumulator results.
    pub fn finish_epoch(&mut self, epoch: usize) -> Result<EpochSummary> {
        let step = self.schedule.global_step;
        tracing::info!("Saving checkpoint at step {}", step);
        let checkpoint = self.checkpoints.save_model::<B, M>(&self.model, step)?;

        let train = self.train_metrics.result();
        let val   = self.val_metrics.result();

        if self.tracker.is_enabled() {
            self.tracker.log(step, &[
                ("train_accuracy",  train.accuracy),
                ("train_precision", train.precision),
                ("train_recall",    train.recall),
                ("val_accuracy",    val.accuracy),
                ("val_precision",   val.precision),
                ("val_recall",      val.recall),
            ])?;
        }

        tracing::info!(
            "Epoch {:>3} | step {} | train acc={:.3} prec={:.3} rec={:.3} | val acc={:.3} prec={:.3} rec={:.3}",
            epoch, step,
            train.accuracy, train.precision, train.recall,
            val.accuracy, val.precision, val.recall,
        );

        Ok(EpochSummary { epoch, global_step: step, train, val, checkpoint })
    }

    /// One full epoch: reset, train, validate, checkpoint.
    pub fn run_epoch<T, V>(&mut self, epoch: usize, train: T, val: V) -> Result<EpochSummary>
    where
        T: IntoIterator<Item = Result<PointCloudBatch<B>>>,
        V: IntoIterator<Item = Result<PointCloudBatch<B::InnerBackend>>>,
    {
        self.reset_metrics();
        let steps = self.train_epoch(train)?;
        let val_batches = self.validate_epoch(val)?;
        tracing::debug!("Epoch {}: {} training steps, {} validation batches", epoch, steps, val_batches);
        self.finish_epoch(epoch)
    }

    /// Drive `epochs` epochs, asking for fresh batch sources at the start of each.
    pub fn fit<T, V, FT, FV>(
        &mut self,
        epochs:       usize,
        mut train_of: FT,
        mut val_of:   FV,
    ) -> Result<Vec<EpochSummary>>
    where
        T:  IntoIterator<Item = Result<PointCloudBatch<B>>>,
        V:  IntoIterator<Item = Result<PointCloudBatch<B::InnerBackend>>>,
        FT: FnMut(usize) -> T,
        FV: FnMut(usize) -> V,
    {
        let mut summaries = Vec::with_capacity(epochs);
        for epoch in 0..epochs {
            tracing::info!("Epoch {}", epoch);
            let summary = self.run_epoch(epoch, train_of(epoch), val_of(epoch))?;
            println!(
                "Epoch {:>3}/{} | step={} | train_acc={:.1}% | val_acc={:.1}% | val_prec={:.1}% | val_rec={:.1}%",
                epoch + 1, epochs, summary.global_step,
                summary.train.accuracy * 100.0,
                summary.val.accuracy * 100.0,
                summary.val.precision * 100.0,
                summary.val.recall * 100.0,
            );
            summaries.push(summary);
        }
        tracing::info!("Training complete!");
        Ok(summaries)
    }
}

// ─── Full run ─────────────────────────────────────────────────────────────────

/// Build PointNet, Adam and the anchor loss, then train on the given files.
pub fn run_training<B: AutodiffBackend>(
    cfg:          &TrainConfig,
    train_files:  Vec<LabeledFile>,
    val_files:    Vec<LabeledFile>,
    ckpt_manager: CheckpointManager,
    tracker:      Box<dyn ExperimentTracker>,
    device:       B::Device,
) -> Result<Vec<EpochSummary>> {
    B::seed(cfg.seed);

    let model_cfg = PointNetConfig::new().with_num_classes(cfg.num_classes);
    let mut model = model_cfg.init::<B>(&device);
    let mut start_step = 0;
    if let Some(path) = &cfg.resume {
        start_step = checkpoint_step(path)?;
        model = CheckpointManager::load_model::<B, _>(path, model, &device)?;
    }
    tracing::info!(
        "Model ready: PointNet with {} classes, {} parameters",
        cfg.num_classes,
        model.num_params()
    );

    let optim   = AdamConfig::new().with_epsilon(1e-7).init();
    let loss_fn = AnchorLossConfig::new().init();

    let steps_per_epoch = train_files.len() / cfg.batch_size.max(1);
    tracing::info!("Steps per epoch = {}", steps_per_epoch);
    tracing::info!("Total steps = {}", steps_per_epoch * cfg.epochs);
    if steps_per_epoch == 0 {
        tracing::warn!(
            "Batch size {} exceeds the {} training files: no training steps will run",
            cfg.batch_size,
            train_files.len()
        );
    }

    let mut trainer = Trainer::new(
        model,
        optim,
        loss_fn,
        cfg.lr_schedule(),
        cfg.num_classes,
        ckpt_manager,
        tracker,
    )
    .resume_at(start_step);

    let start = trainer.schedule();
    tracing::info!(
        "Starting at step {} | lr={:.3e} | bn_momentum={:.4}",
        start.global_step,
        start.learning_rate,
        start.bn_momentum
    );

    let train_batcher = PointCloudBatcher::<B>::new(device.clone(), cfg.num_classes);
    let val_batcher   = PointCloudBatcher::<B::InnerBackend>::new(device.clone(), cfg.num_classes);

    // File order is reshuffled every epoch, reproducibly from the seed.
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let mut train_order = train_files;

    trainer.fit(
        cfg.epochs,
        |epoch| {
            train_order.shuffle(&mut rng);
            let stream = BatchStream::new(train_order.clone(), cfg.batch_size, cfg.num_points, train_batcher.clone());
            tracing::debug!("Epoch {}: {} training batches", epoch, stream.num_batches());
            stream
        },
        |_| BatchStream::new(val_files.clone(), cfg.batch_size, cfg.num_points, val_batcher.clone()),
    )
}
