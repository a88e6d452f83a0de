// ============================================================
// Layer 3 — Running Classification Metrics
// ============================================================
// Each accumulator is a handful of counters that grow with every
// batch and are cleared at the start of an epoch:
//
//   CategoricalAccuracy  correct / total
//   Precision            tp / (tp + fp)
//   Recall               tp / (tp + fn)
//
// SplitMetrics bundles the three for one data split and applies
// the decision rules used by the training loop:
//   - accuracy compares argmax(labels) with argmax(sigmoid(scores))
//   - precision/recall threshold the hard argmax one-hot at 0.5
//
// Every ratio is 0.0 while its denominator is still 0.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::domain::point_cloud::ScoreMatrix;

/// Decision threshold applied to predictions and labels for precision/recall.
pub const THRESHOLD: f32 = 0.5;

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

fn check_shapes(labels: &ScoreMatrix, predictions: &ScoreMatrix) -> Result<()> {
    ensure!(
        labels.rows() == predictions.rows() && labels.cols() == predictions.cols(),
        "labels have shape [{}, {}] but predictions have shape [{}, {}]",
        labels.rows(), labels.cols(), predictions.rows(), predictions.cols()
    );
    Ok(())
}

/// Fraction of rows whose predicted class matches the labelled class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoricalAccuracy {
    correct: u64,
    total:   u64,
}

impl CategoricalAccuracy {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn update(&mut self, labels: &ScoreMatrix, predictions: &ScoreMatrix) -> Result<()> {
        check_shapes(labels, predictions)?;
        let matches = labels
            .argmax_rows()
            .into_iter()
            .zip(predictions.argmax_rows())
            .filter(|(truth, pred)| truth == pred)
            .count();
        self.correct += matches as u64;
        self.total   += labels.rows() as u64;
        Ok(())
    }

    pub fn result(&self) -> f64 {
        ratio(self.correct, self.total)
    }
}

/// Element-wise confusion counts over thresholded predictions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionCounts {
    pub true_positives:  u64,
    pub false_positives: u64,
    pub false_negatives: u64,
}

impl ConfusionCounts {
    fn add(&mut self, labels: &ScoreMatrix, predictions: &ScoreMatrix) -> Result<()> {
        check_shapes(labels, predictions)?;
        for (&truth, &pred) in labels.values().iter().zip(predictions.values()) {
            let actual    = truth > THRESHOLD;
            let predicted = pred > THRESHOLD;
            match (actual, predicted) {
                (true, true)  => self.true_positives  += 1,
                (false, true) => self.false_positives += 1,
                (true, false) => self.false_negatives += 1,
                (false, false) => {}
            }
        }
        Ok(())
    }
}

/// True positives over predicted positives, running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Precision {
    counts: ConfusionCounts,
}

impl Precision {
    pub fn reset(&mut self) {
        self.counts = ConfusionCounts::default();
    }

    pub fn update(&mut self, labels: &ScoreMatrix, predictions: &ScoreMatrix) -> Result<()> {
        self.counts.add(labels, predictions)
    }

    pub fn result(&self) -> f64 {
        let c = self.counts;
        ratio(c.true_positives, c.true_positives + c.false_positives)
    }
}

/// True positives over actual positives, running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Recall {
    counts: ConfusionCounts,
}

impl Recall {
    pub fn reset(&mut self) {
        self.counts = ConfusionCounts::default();
    }

    pub fn update(&mut self, labels: &ScoreMatrix, predictions: &ScoreMatrix) -> Result<()> {
        self.counts.add(labels, predictions)
    }

    pub fn result(&self) -> f64 {
        let c = self.counts;
        ratio(c.true_positives, c.true_positives + c.false_negatives)
    }
}

/// Scalar results of one split's accumulators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub accuracy:  f64,
    pub precision: f64,
    pub recall:    f64,
}

/// Accuracy, precision and recall for one data split.
#[derive(Debug, Clone)]
pub struct SplitMetrics {
    num_classes: usize,
    accuracy:    CategoricalAccuracy,
    precision:   Precision,
    recall:      Recall,
}

impl SplitMetrics {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            accuracy:  CategoricalAccuracy::default(),
            precision: Precision::default(),
            recall:    Recall::default(),
        }
    }

    pub fn reset(&mut self) {
        self.accuracy.reset();
        self.precision.reset();
        self.recall.reset();
    }

    /// Consume one batch of one-hot labels and raw logits.
    pub fn update(&mut self, labels: &ScoreMatrix, logits: &ScoreMatrix) -> Result<()> {
        ensure!(
            logits.cols() == self.num_classes,
            "model produced {} class scores, expected {}",
            logits.cols(),
            self.num_classes
        );
        check_shapes(labels, logits)?;

        let probabilities = logits.sigmoid();
        self.accuracy.update(labels, &probabilities)?;

        let hard = probabilities.argmax_one_hot();
        self.precision.update(labels, &hard)?;
        self.recall.update(labels, &hard)?;
        Ok(())
    }

    pub fn result(&self) -> MetricSummary {
        MetricSummary {
            accuracy:  self.accuracy.result(),
            precision: self.precision.result(),
            recall:    self.recall.result(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> ScoreMatrix {
        ScoreMatrix::one_hot(&[0, 1, 2, 1], 3).unwrap()
    }

    fn logits() -> ScoreMatrix {
        // argmax per row: 0, 1, 0, 2 → rows 0 and 1 correct
        ScoreMatrix::new(4, 3, vec![
             2.0, -1.0,  0.0,
             0.1,  0.9, -3.0,
             1.5,  0.2,  1.0,
            -1.0,  0.0,  0.5,
        ]).unwrap()
    }

    #[test]
    fn test_empty_accumulators_are_zero() {
        let mut m = SplitMetrics::new(3);
        m.reset();
        assert_eq!(m.result(), MetricSummary::default());
    }

    #[test]
    fn test_hand_computed_batch() {
        let mut m = SplitMetrics::new(3);
        m.update(&labels(), &logits()).unwrap();
        let r = m.result();
        assert_eq!(r.accuracy, 0.5);
        // one prediction per row: 2 tp, 2 fp, 2 fn
        assert_eq!(r.precision, 0.5);
        assert_eq!(r.recall, 0.5);
        assert_eq!(m.precision.counts, ConfusionCounts {
            true_positives: 2, false_positives: 2, false_negatives: 2,
        });
    }

    #[test]
    fn test_precision_and_recall_diverge_on_soft_predictions() {
        // Raw thresholding, not the argmax path: row 0 predicts two classes.
        let labels = ScoreMatrix::one_hot(&[0, 1], 2).unwrap();
        let preds  = ScoreMatrix::new(2, 2, vec![0.9, 0.8, 0.1, 0.2]).unwrap();
        let mut p = Precision::default();
        let mut r = Recall::default();
        p.update(&labels, &preds).unwrap();
        r.update(&labels, &preds).unwrap();
        assert_eq!(p.result(), 0.5);
        assert_eq!(r.result(), 0.5);

        let preds = ScoreMatrix::new(2, 2, vec![0.9, 0.8, 0.1, 0.7]).unwrap();
        let mut p = Precision::default();
        let mut r = Recall::default();
        p.update(&labels, &preds).unwrap();
        r.update(&labels, &preds).unwrap();
        assert!((p.result() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(r.result(), 1.0);
    }

    #[test]
    fn test_repeated_batches_scale_counts_linearly() {
        let mut once = SplitMetrics::new(3);
        once.update(&labels(), &logits()).unwrap();

        let mut many = SplitMetrics::new(3);
        for _ in 0..5 {
            many.update(&labels(), &logits()).unwrap();
        }

        assert_eq!(once.result(), many.result());
        let c1 = once.recall.counts;
        let c5 = many.recall.counts;
        assert_eq!(c5.true_positives, 5 * c1.true_positives);
        assert_eq!(c5.false_negatives, 5 * c1.false_negatives);
        assert_eq!(many.accuracy, CategoricalAccuracy { correct: 10, total: 20 });
    }

    #[test]
    fn test_reset_clears_running_state() {
        let mut m = SplitMetrics::new(3);
        m.update(&labels(), &logits()).unwrap();
        m.reset();
        assert_eq!(m.result(), MetricSummary::default());
    }

    #[test]
    fn test_class_count_mismatch_is_an_error() {
        let mut m = SplitMetrics::new(40);
        assert!(m.update(&labels(), &logits()).is_err());
    }

    #[test]
    fn test_row_count_mismatch_is_an_error() {
        let mut m = SplitMetrics::new(3);
        let short = ScoreMatrix::one_hot(&[0, 1], 3).unwrap();
        assert!(m.update(&short, &logits()).is_err());
    }

    #[test]
    fn test_splits_are_independent() {
        let mut train = SplitMetrics::new(3);
        let mut val   = SplitMetrics::new(3);
        train.update(&labels(), &logits()).unwrap();
        assert_eq!(val.result(), MetricSummary::default());
        val.update(&labels(), &labels()).unwrap();
        assert_eq!(val.result().accuracy, 1.0);
        assert_eq!(train.result().accuracy, 0.5);
    }
}
