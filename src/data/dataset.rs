// ============================================================
// Layer 4 — ModelNet40 File Index
// ============================================================
// Expected layout:
//
//   <root>/
//     airplane/
//       train/airplane_0001.npy ...
//       test/airplane_0627.npy ...
//     bathtub/
//       ...
//
// Class directories are sorted by name and numbered from 0, so
// the same tree always yields the same label assignment.

use std::{
    fs,
    path::Path,
};

use anyhow::{bail, Context, Result};

use crate::domain::point_cloud::LabeledFile;

const POINT_CLOUD_EXTENSION: &str = "npy";

/// All labelled point-cloud files found under a dataset root.
#[derive(Debug, Clone)]
pub struct ModelNetIndex {
    pub classes: Vec<String>,
    pub train:   Vec<LabeledFile>,
    pub test:    Vec<LabeledFile>,
}

impl ModelNetIndex {
    pub fn scan(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            bail!("dataset directory '{}' does not exist", root.display());
        }

        let mut classes: Vec<String> = fs::read_dir(root)
            .with_context(|| format!("Cannot read directory '{}'", root.display()))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        classes.sort();

        if classes.is_empty() {
            bail!("no class directories found under '{}'", root.display());
        }

        let mut train = Vec::new();
        let mut test  = Vec::new();
        for (label, class) in classes.iter().enumerate() {
            let class_dir = root.join(class);
            train.extend(list_split(&class_dir.join("train"), label)?);
            test.extend(list_split(&class_dir.join("test"), label)?);
        }

        tracing::info!(
            "Indexed {} classes under '{}': {} train files, {} test files",
            classes.len(),
            root.display(),
            train.len(),
            test.len()
        );

        Ok(Self { classes, train, test })
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }
}

/// List the `.npy` files of one class split, sorted by path.
/// A missing split directory contributes no files.
fn list_split(dir: &Path, label: usize) -> Result<Vec<LabeledFile>> {
    if !dir.is_dir() {
        tracing::debug!("Split directory '{}' is missing", dir.display());
        return Ok(Vec::new());
    }

    let mut paths = Vec::new();
    for entry in fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some(POINT_CLOUD_EXTENSION) {
            paths.push(path);
        }
    }
    paths.sort();

    Ok(paths.into_iter().map(|p| LabeledFile::new(p, label)).collect())
}
