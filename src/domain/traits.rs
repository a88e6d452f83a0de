// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The trainer reports numbers through this seam without knowing
// where they end up. Implementations:
//   - NoopTracker   → discards everything (tracking disabled)
//   - JsonlTracker  → appends records to a run-local file (infra)

use anyhow::Result;

// ─── ExperimentTracker ────────────────────────────────────────────────────────
/// Any sink that accepts key/value numeric records tagged with a step.
pub trait ExperimentTracker {
    /// Record `values` at the given global step.
    fn log(&mut self, step: u64, values: &[(&str, f64)]) -> Result<()>;

    /// Whether records are kept at all. Callers may skip building them.
    fn is_enabled(&self) -> bool {
        true
    }
}

/// Tracker used when experiment tracking is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTracker;

impl ExperimentTracker for NoopTracker {
    fn log(&mut self, _step: u64, _values: &[(&str, f64)]) -> Result<()> {
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        false
    }
}

impl<T: ExperimentTracker + ?Sized> ExperimentTracker for Box<T> {
    fn log(&mut self, step: u64, values: &[(&str, f64)]) -> Result<()> {
        (**self).log(step, values)
    }

    fn is_enabled(&self) -> bool {
        (**self).is_enabled()
    }
}
