// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Appends one CSV row per evaluation so learning curves can be
// plotted after (or during) a run.
//
// Example CSV output:
//   epoch,mean_loss,bleu_train,bleu_infer
//   0,,0.000000,0.000000
//   20,3.124500,0.081200,0.012000
//   40,2.890100,0.184000,0.072000
//
// The epoch-0 row is the evaluation before any training and has
// no loss. A widening gap between bleu_train and bleu_infer is
// exposure bias: the model only does well on gold prefixes.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::ml::evaluator::EvaluationReport;

/// One row of the metrics CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub epoch: usize,
    /// Mean training loss since the previous evaluation.
    pub mean_loss: Option<f64>,
    pub bleu_train: f64,
    pub bleu_infer: f64,
}

impl From<&EvaluationReport> for EvaluationMetrics {
    fn from(r: &EvaluationReport) -> Self {
        Self {
            epoch: r.epoch,
            mean_loss: r.mean_loss,
            bleu_train: r.bleu_train,
            bleu_infer: r.bleu_infer,
        }
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet, so
    /// resumed runs keep appending to the same log.
    pub fn new(csv_path: impl Into<PathBuf>) -> Result<Self> {
        let csv_path = csv_path.into();
        if let Some(dir) = csv_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create metrics file '{}'", csv_path.display()))?;
            writeln!(f, "epoch,mean_loss,bleu_train,bleu_infer")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &EvaluationMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        let loss = m.mean_loss.map(|l| format!("{l:.6}")).unwrap_or_default();
        writeln!(f, "{},{},{:.6},{:.6}", m.epoch, loss, m.bleu_train, m.bleu_infer)?;

        tracing::debug!(
            "Logged epoch {} metrics: bleu_train={:.4}, bleu_infer={:.4}",
            m.epoch,
            m.bleu_train,
            m.bleu_infer,
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_rows_are_appended_after_header() {
        let tmp = TempDir::new().unwrap();
        let logger = MetricsLogger::new(tmp.path().join("run.metrics.csv")).unwrap();
        logger
            .log(&EvaluationMetrics { epoch: 0, mean_loss: None, bleu_train: 0.0, bleu_infer: 0.0 })
            .unwrap();
        logger
            .log(&EvaluationMetrics { epoch: 20, mean_loss: Some(2.5), bleu_train: 0.25, bleu_infer: 0.125 })
            .unwrap();

        let text = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "epoch,mean_loss,bleu_train,bleu_infer");
        assert_eq!(lines[1], "0,,0.000000,0.000000");
        assert_eq!(lines[2], "20,2.500000,0.250000,0.125000");
    }

    #[test]
    fn test_existing_file_is_not_truncated() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m.csv");
        let m = EvaluationMetrics { epoch: 1, mean_loss: Some(1.0), bleu_train: 0.5, bleu_infer: 0.5 };
        MetricsLogger::new(&path).unwrap().log(&m).unwrap();
        MetricsLogger::new(&path).unwrap().log(&m).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 3);
    }
}
