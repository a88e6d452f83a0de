// ============================================================
// Layer 3 — Step Schedules
// ============================================================
// Two pure functions of the global step:
//
//   bn_momentum(step)      = min(0.99, 0.5 + 0.0002 * step)
//   learning_rate(step)    = initial * warm_up(step) * decay(step)
//
//   warm_up(step) = min(1, step / 2000)         (when enabled)
//   decay(step)   = rate ^ floor(step / steps)  (staircase)
//                 = rate ^ (step / steps)       (continuous)
//
// Neither function keeps hidden state, so recomputing a value
// for a given step always yields the same number.

use serde::{Deserialize, Serialize};

pub const BN_MOMENTUM_START: f64 = 0.5;
pub const BN_MOMENTUM_SLOPE: f64 = 0.0002;
pub const BN_MOMENTUM_MAX:   f64 = 0.99;

/// Steps over which the learning rate ramps linearly from 0.
pub const WARM_UP_STEPS: u64 = 2000;

/// Batch-normalization momentum for a given global step.
pub fn bn_momentum(step: u64) -> f64 {
    (BN_MOMENTUM_START + BN_MOMENTUM_SLOPE * step as f64).min(BN_MOMENTUM_MAX)
}

/// Exponentially decaying learning rate with an optional linear warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LearningRateSchedule {
    pub initial:     f64,
    pub decay_steps: u64,
    pub decay_rate:  f64,
    pub staircase:   bool,
    pub warm_up:     bool,
}

impl LearningRateSchedule {
    pub fn new(initial: f64) -> Self {
        Self {
            initial,
            decay_steps: 7000,
            decay_rate:  0.7,
            staircase:   false,
            warm_up:     true,
        }
    }

    pub fn with_decay(mut self, decay_steps: u64, decay_rate: f64) -> Self {
        self.decay_steps = decay_steps;
        self.decay_rate  = decay_rate;
        self
    }

    pub fn with_staircase(mut self, staircase: bool) -> Self {
        self.staircase = staircase;
        self
    }

    pub fn with_warm_up(mut self, warm_up: bool) -> Self {
        self.warm_up = warm_up;
        self
    }

    /// Learning rate at `step`. Zero at step 0 when warm-up is enabled.
    pub fn at(&self, step: u64) -> f64 {
        self.initial * self.warm_up_coefficient(step) * self.decay_coefficient(step)
    }

    pub fn warm_up_coefficient(&self, step: u64) -> f64 {
        if self.warm_up {
            (step as f64 / WARM_UP_STEPS as f64).min(1.0)
        } else {
            1.0
        }
    }

    /// `decay_steps == 0` disables decay.
    pub fn decay_coefficient(&self, step: u64) -> f64 {
        if self.decay_steps == 0 {
            return 1.0;
        }
        let exponent = if self.staircase {
            (step / self.decay_steps) as f64
        } else {
            step as f64 / self.decay_steps as f64
        };
        self.decay_rate.powf(exponent)
    }
}

/// The three values the trainer advances after every training batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleState {
    pub global_step:   u64,
    pub bn_momentum:   f64,
    pub learning_rate: f64,
}

impl ScheduleState {
    /// State before the first training batch.
    pub fn initial(lr: &LearningRateSchedule) -> Self {
        Self::at(0, lr)
    }

    pub fn at(step: u64, lr: &LearningRateSchedule) -> Self {
        Self {
            global_step:   step,
            bn_momentum:   bn_momentum(step),
            learning_rate: lr.at(step),
        }
    }

    /// Move to the next global step and recompute both schedules from it.
    pub fn advance(&mut self, lr: &LearningRateSchedule) {
        *self = Self::at(self.global_step + 1, lr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_lr() -> LearningRateSchedule {
        LearningRateSchedule::new(1e-3)
    }

    #[test]
    fn test_momentum_starts_at_half() {
        assert_eq!(bn_momentum(0), 0.5);
    }

    #[test]
    fn test_momentum_non_decreasing_and_bounded() {
        let mut prev = bn_momentum(0);
        for step in (0..20_000).step_by(7) {
            let m = bn_momentum(step);
            assert!(m >= prev, "momentum decreased at step {step}");
            assert!(m <= 0.99);
            prev = m;
        }
    }

    #[test]
    fn test_momentum_saturates() {
        // 0.5 + 0.0002 * 2450 = 0.99
        assert!((bn_momentum(2450) - 0.99).abs() < 1e-12);
        assert_eq!(bn_momentum(1_000_000), 0.99);
    }

    #[test]
    fn test_learning_rate_zero_at_step_zero() {
        assert_eq!(default_lr().at(0), 0.0);
    }

    #[test]
    fn test_warm_up_ramps_linearly() {
        let lr = default_lr().with_decay(u64::MAX, 0.7);
        assert!((lr.at(1000) - 0.5e-3).abs() < 1e-12);
        assert!((lr.at(500) - 0.25e-3).abs() < 1e-12);
    }

    #[test]
    fn test_after_warm_up_matches_pure_decay() {
        let warm = default_lr();
        let cold = default_lr().with_warm_up(false);
        for step in [2000, 2001, 5000, 7000, 14_000, 123_456] {
            assert_eq!(warm.warm_up_coefficient(step), 1.0);
            assert_eq!(warm.at(step), cold.at(step));
        }
    }

    #[test]
    fn test_continuous_decay() {
        let lr = default_lr().with_warm_up(false);
        assert!((lr.at(7000) - 0.7e-3).abs() < 1e-15);
        assert!((lr.at(3500) - 1e-3 * 0.7f64.sqrt()).abs() < 1e-15);
    }

    #[test]
    fn test_staircase_constant_on_each_interval() {
        let d = 100;
        let lr = default_lr()
            .with_decay(d, 0.5)
            .with_staircase(true)
            .with_warm_up(false);
        for k in 0..5u64 {
            let first = lr.at(k * d);
            for step in k * d..(k + 1) * d {
                assert_eq!(lr.at(step), first);
            }
            assert!(lr.at((k + 1) * d) < first);
        }
    }

    #[test]
    fn test_zero_decay_steps_disables_decay() {
        for staircase in [false, true] {
            let lr = default_lr()
                .with_decay(0, 0.5)
                .with_staircase(staircase)
                .with_warm_up(false);
            assert_eq!(lr.at(0), 1e-3);
            assert_eq!(lr.at(10_000), 1e-3);
        }
    }

    #[test]
    fn test_schedule_state_advance() {
        let lr = default_lr();
        let mut state = ScheduleState::initial(&lr);
        assert_eq!(state.global_step, 0);
        assert_eq!(state.learning_rate, 0.0);

        state.advance(&lr);
        assert_eq!(state.global_step, 1);
        assert_eq!(state.bn_momentum, bn_momentum(1));
        assert_eq!(state.learning_rate, lr.at(1));
        assert_eq!(state, ScheduleState::at(1, &lr));
    }
}
