// ============================================================
// Layer 6 — Prediction Writer
// ============================================================
// Dumps the raw evaluation arrays so they can be inspected
// or plotted outside this program. One JSON object, every
// field keyed by batch index:
//
//   {
//     "similarity": { "0": [[[f32; J]; T]; B], ... },
//     "true_start": { "0": [i64; B], ... },
//     "true_end":   { ... },
//     "pred_start": { ... },
//     "pred_end":   { ... }
//   }

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::BufWriter,
    path::{Path, PathBuf},
};

/// Evaluation output of a single batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchPrediction {
    /// Similarity matrix S — [B][T][J]
    pub similarity: Vec<Vec<Vec<f32>>>,
    pub true_start: Vec<i64>,
    pub true_end:   Vec<i64>,
    pub pred_start: Vec<i64>,
    pub pred_end:   Vec<i64>,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PredictionResults {
    pub similarity: BTreeMap<usize, Vec<Vec<Vec<f32>>>>,
    pub true_start: BTreeMap<usize, Vec<i64>>,
    pub true_end:   BTreeMap<usize, Vec<i64>>,
    pub pred_start: BTreeMap<usize, Vec<i64>>,
    pub pred_end:   BTreeMap<usize, Vec<i64>>,
}

impl PredictionResults {
    pub fn from_batches(batches: Vec<BatchPrediction>) -> Self {
        let mut out = Self::default();
        for (i, b) in batches.into_iter().enumerate() {
            out.similarity.insert(i, b.similarity);
            out.true_start.insert(i, b.true_start);
            out.true_end.insert(i, b.true_end);
            out.pred_start.insert(i, b.pred_start);
            out.pred_end.insert(i, b.pred_end);
        }
        out
    }

    pub fn batch_count(&self) -> usize {
        self.true_start.len()
    }
}

pub struct PredictionWriter {
    path: PathBuf,
}

impl PredictionWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, results: &PredictionResults) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create '{}'", parent.display()))?;
        }
        let file = File::create(&self.path)
            .with_context(|| format!("Cannot create '{}'", self.path.display()))?;
        serde_json::to_writer(BufWriter::new(file), results)
            .with_context(|| format!("Cannot write predictions to '{}'", self.path.display()))?;
        tracing::info!(
            "Wrote predictions for {} batches to '{}'",
            results.batch_count(),
            self.path.display()
        );
        Ok(())
    }
}
