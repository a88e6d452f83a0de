// ============================================================
// Layer 6 — Experiment Tracker
// ============================================================
// Appends one JSON object per record to a file in the run
// directory. Step records and epoch records share the file and
// are told apart by their keys.
//
// Output file: model/checkpoints/<timestamp>/metrics.jsonl
//
// Example output:
//   {"step":0,"time_per_step":0.41,"learning_rate":0.0,"training_loss":3.92,"mat_reg_loss":0.0,"bn_momentum":0.5}
//   {"step":1,"time_per_step":0.38,"learning_rate":5e-7,"training_loss":3.88,"mat_reg_loss":0.001,"bn_momentum":0.5002}
//   ...
//   {"step":307,"train_accuracy":0.41,"train_precision":0.43,"train_recall":0.41,"val_accuracy":0.52,...}
//
// The file is opened in append mode. A resumed run gets a new
// timestamped directory and so a fresh log; only runs started
// within the same minute end up appending to one file.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::{Map, Number, Value};

use crate::domain::traits::ExperimentTracker;

pub const METRICS_FILE: &str = "metrics.jsonl";

/// Writes tracker records as JSON lines.
pub struct JsonlTracker {
    path:   PathBuf,
    writer: BufWriter<File>,
}

impl JsonlTracker {
    /// Open (or create) `<dir>/metrics.jsonl` for appending.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let path = dir.join(METRICS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Cannot open metrics log '{}'", path.display()))?;

        Ok(Self { path, writer: BufWriter::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExperimentTracker for JsonlTracker {
    fn log(&mut self, step: u64, values: &[(&str, f64)]) -> Result<()> {
        let mut record = Map::with_capacity(values.len() + 1);
        record.insert("step".into(), Value::from(step));
        for (key, value) in values {
            // NaN and infinities have no JSON number form.
            let number = Number::from_f64(*value).map(Value::Number).unwrap_or(Value::Null);
            record.insert((*key).to_string(), number);
        }

        serde_json::to_writer(&mut self.writer, &Value::Object(record))?;
        writeln!(self.writer)?;
        // One flush per record keeps the log readable while training runs.
        self.writer.flush()?;
        Ok(())
    }
}
