// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics as CSV inside a run directory:
//
//   logs/20240101-120000/
//     steps.csv    ← one row per log interval
//     metrics.csv  ← one row per finished epoch
//
// The run directory is named after the start time so runs
// never overwrite each other.
//
// Example metrics.csv:
//   epoch,loss_p1,loss_p2,p1_acc,p2_acc
//   0,4.812300,4.701100,0.081000,0.092000
//   1,3.990200,3.850400,0.151000,0.167000
//
// Losses are means over the epoch's batches; accuracies are
// fractions in [0, 1].
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::{Context, Result};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use serde::{Deserialize, Serialize};

/// One row of metrics data for a single training epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch:   usize,
    pub loss_p1: f64,
    pub loss_p2: f64,
    pub p1_acc:  f64,
    pub p2_acc:  f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, loss_p1: f64, loss_p2: f64, p1_acc: f64, p2_acc: f64) -> Self {
        Self { epoch, loss_p1, loss_p2, p1_acc, p2_acc }
    }

    /// Mean of start and end accuracy; what "best epoch" is judged on
    pub fn accuracy(&self) -> f64 {
        (self.p1_acc + self.p2_acc) / 2.0
    }

    /// Returns true if this epoch beats the previous best accuracy
    pub fn is_improvement(&self, best_acc: f64) -> bool {
        self.accuracy() > best_acc
    }
}

/// Running scalars at one log point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepMetrics {
    pub epoch:   usize,
    pub batch:   usize,
    /// Samples seen since the first epoch of the run
    pub step:    usize,
    pub loss_p1: f64,
    pub loss_p2: f64,
    pub p1_acc:  f64,
    pub p2_acc:  f64,
}

/// Appends metrics rows to CSV files in one run directory.
pub struct MetricsLogger {
    run_dir:    PathBuf,
    epoch_csv:  PathBuf,
    step_csv:   PathBuf,
}

impl MetricsLogger {
    /// Log into `dir` directly.
    /// Writes the CSV headers if the files don't exist yet.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let run_dir = dir.into();
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Cannot create log dir '{}'", run_dir.display()))?;

        let epoch_csv = run_dir.join("metrics.csv");
        let step_csv  = run_dir.join("steps.csv");
        write_header(&epoch_csv, "epoch,loss_p1,loss_p2,p1_acc,p2_acc")?;
        write_header(&step_csv, "epoch,batch,step,loss_p1,loss_p2,p1_acc,p2_acc")?;

        Ok(Self { run_dir, epoch_csv, step_csv })
    }

    /// Log into a fresh `{root}/%Y%m%d-%H%M%S` directory
    pub fn timestamped(root: impl AsRef<Path>) -> Result<Self> {
        let label = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
        Self::new(root.as_ref().join(label))
    }

    pub fn log_epoch(&self, m: &EpochMetrics) -> Result<()> {
        append_row(
            &self.epoch_csv,
            format_args!(
                "{},{:.6},{:.6},{:.6},{:.6}",
                m.epoch, m.loss_p1, m.loss_p2, m.p1_acc, m.p2_acc,
            ),
        )?;
        tracing::debug!("Logged epoch {} metrics", m.epoch);
        Ok(())
    }

    pub fn log_step(&self, m: &StepMetrics) -> Result<()> {
        append_row(
            &self.step_csv,
            format_args!(
                "{},{},{},{:.6},{:.6},{:.6},{:.6}",
                m.epoch, m.batch, m.step, m.loss_p1, m.loss_p2, m.p1_acc, m.p2_acc,
            ),
        )
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn csv_path(&self) -> &Path {
        &self.epoch_csv
    }
}

fn write_header(path: &Path, header: &str) -> Result<()> {
    // Only for new files, so reruns in the same dir keep appending
    if !path.exists() {
        let mut f = fs::File::create(path)
            .with_context(|| format!("Cannot create '{}'", path.display()))?;
        writeln!(f, "{header}")?;
        tracing::debug!("Created metrics CSV: '{}'", path.display());
    }
    Ok(())
}

fn append_row(path: &Path, row: std::fmt::Arguments<'_>) -> Result<()> {
    let mut f = OpenOptions::new()
        .append(true)
        .open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;
    writeln!(f, "{row}")?;
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_improvement() {
        let m = EpochMetrics::new(2, 2.5, 2.3, 0.25, 0.75);
        assert_eq!(m.accuracy(), 0.5);
        assert!(m.is_improvement(0.25));
        assert!(!m.is_improvement(0.5));
        assert!(!m.is_improvement(m.accuracy()));
        assert!(!m.is_improvement(0.75));
    }

    #[test]
    fn test_rows_are_appended_after_header() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path()).unwrap();
        logger.log_epoch(&EpochMetrics::new(0, 1.0, 2.0, 0.5, 0.25)).unwrap();
        logger.log_epoch(&EpochMetrics::new(1, 0.5, 1.0, 0.75, 0.5)).unwrap();

        let csv = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "epoch,loss_p1,loss_p2,p1_acc,p2_acc");
        assert_eq!(lines[1], "0,1.000000,2.000000,0.500000,0.250000");
    }

    #[test]
    fn test_reopening_keeps_existing_rows() {
        let dir = tempfile::tempdir().unwrap();
        MetricsLogger::new(dir.path())
            .unwrap()
            .log_step(&StepMetrics {
                epoch: 0, batch: 99, step: 3168,
                loss_p1: 1.0, loss_p2: 1.0, p1_acc: 0.0, p2_acc: 0.0,
            })
            .unwrap();

        let logger = MetricsLogger::new(dir.path()).unwrap();
        let steps = fs::read_to_string(logger.run_dir().join("steps.csv")).unwrap();
        assert_eq!(steps.lines().count(), 2);
    }

    #[test]
    fn test_timestamped_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::timestamped(dir.path()).unwrap();
        let name = logger.run_dir().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), "20240101-120000".len());
        assert!(logger.csv_path().is_file());
    }
}
