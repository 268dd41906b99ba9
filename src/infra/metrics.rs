// ============================================================
// Layer 6 - Metrics Logger
// ============================================================
// Appends every training window and dev pass to a CSV file so
// learning curves can be plotted after (or during) a run.
//
// Output file: models/metrics.csv
//
//   kind,report,epoch,loss,words,ppl
//   train,1,0.0250,812.331200,190,71.882300
//   train,2,0.0500,790.120000,201,50.911100
//   ...
//   dev,20,0.5000,9120.500000,2300,52.602900
//
// `loss` is the summed negative log-likelihood over the window,
// `ppl` is exp(loss / words). The file is appended to across
// resumed runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Train,
    Dev,
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportKind::Train => f.write_str("train"),
            ReportKind::Dev   => f.write_str("dev"),
        }
    }
}

/// Totals for one reporting window or dev pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub kind:   ReportKind,
    /// Reporting cycle this row was produced in (1-based).
    pub report: usize,
    /// Fractional epochs completed.
    pub epoch:  f64,
    /// Summed loss over the documents of the window.
    pub loss:   f64,
    /// Prediction targets in the same documents.
    pub words:  usize,
}

impl ReportMetrics {
    /// Mean loss per target; `None` when nothing was predicted.
    pub fn per_word(&self) -> Option<f64> {
        (self.words > 0).then(|| self.loss / self.words as f64)
    }

    pub fn perplexity(&self) -> Option<f64> {
        self.per_word().map(f64::exp)
    }
}

pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)
                .with_context(|| format!("Cannot create '{}'", csv_path.display()))?;
            writeln!(f, "kind,report,epoch,loss,words,ppl")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    pub fn log(&self, m: &ReportMetrics) -> Result<()> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot append to '{}'", self.csv_path.display()))?;

        let ppl = m.perplexity().map(|p| format!("{p:.6}")).unwrap_or_default();
        writeln!(f, "{},{},{:.4},{:.6},{},{}", m.kind, m.report, m.epoch, m.loss, m.words, ppl)?;
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn row(kind: ReportKind, loss: f64, words: usize) -> ReportMetrics {
        ReportMetrics { kind, report: 3, epoch: 0.25, loss, words }
    }

    #[test]
    fn test_perplexity() {
        let m = row(ReportKind::Train, 2.0 * 10f64.ln(), 2);
        assert!((m.perplexity().unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_words_has_no_perplexity() {
        assert!(row(ReportKind::Dev, 1.0, 0).perplexity().is_none());
    }

    #[test]
    fn test_rows_are_appended_after_header() {
        let tmp    = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(tmp.path()).unwrap();
        logger.log(&row(ReportKind::Train, 4.0, 2)).unwrap();
        logger.log(&row(ReportKind::Dev, 1.0, 0)).unwrap();

        let text  = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "kind,report,epoch,loss,words,ppl");
        assert!(lines[1].starts_with("train,3,0.2500,4.000000,2,7.389"));
        assert_eq!(lines[2], "dev,3,0.2500,1.000000,0,");
    }

    #[test]
    fn test_existing_file_keeps_its_rows() {
        let tmp = tempfile::tempdir().unwrap();
        MetricsLogger::new(tmp.path()).unwrap().log(&row(ReportKind::Train, 1.0, 1)).unwrap();
        let again = MetricsLogger::new(tmp.path()).unwrap();
        let text  = fs::read_to_string(again.csv_path()).unwrap();
        assert_eq!(text.lines().count(), 2);
    }
}
