// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records training metrics to a CSV file after each epoch.
//
// Why log metrics to CSV?
//   - Easy to open in Excel or Google Sheets
//   - Can plot learning curves to diagnose training issues
//   - Provides a permanent record of each training run
//
// Metrics recorded per epoch:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - train_loss: average next-token loss on the training set
//   - val_loss:   average next-token loss on the validation
//                 set, empty when no validation file was given
//
// Output file: {output_dir}/metrics.csv
//
// Example CSV output:
//   epoch,train_loss,val_loss
//   1,3.124500,3.089200
//   2,2.890100,2.854300
//
// How to read the metrics:
//   - Loss should decrease each epoch (model is learning)
//   - If val_loss increases while train_loss decreases → overfitting
//
// Reference: Rust Book §9 (Error Handling)
//            Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// Logs epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    /// Full path to the CSV file
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create a new MetricsLogger.
    /// Writes the CSV header if the file doesn't exist yet.
    pub fn new(dir: impl Into<String>) -> Result<Self> {
        let dir = PathBuf::from(dir.into());

        // Create directory if it doesn't exist
        fs::create_dir_all(&dir)?;

        let csv_path = dir.join("metrics.csv");

        // Write CSV header only if file is new
        // This allows appending to an existing log across runs
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,train_loss,val_loss")?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { csv_path })
    }

    /// Append one epoch's losses as a new row in the CSV.
    /// The val_loss column stays empty when no validation set ran.
    pub fn log_epoch(
        &self,
        epoch:      usize,
        train_loss: f64,
        val_loss:   Option<f64>,
    ) -> Result<()> {
        // Open in append mode — adds to end of file
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)?;

        match val_loss {
            Some(v) => writeln!(f, "{},{:.6},{:.6}", epoch, train_loss, v)?,
            None    => writeln!(f, "{},{:.6},",      epoch, train_loss)?,
        }

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:?}",
            epoch, train_loss, val_loss,
        );

        Ok(())
    }

    /// Return the path to the metrics CSV file
    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_then_rows() {
        let dir = tempfile::tempdir().unwrap();
        let logger = MetricsLogger::new(dir.path().to_str().unwrap()).unwrap();

        logger.log_epoch(1, 3.5, Some(3.4)).unwrap();
        logger.log_epoch(2, 2.9, None).unwrap();

        let body = fs::read_to_string(logger.csv_path()).unwrap();
        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines[0], "epoch,train_loss,val_loss");
        assert_eq!(lines[1], "1,3.500000,3.400000");
        assert_eq!(lines[2], "2,2.900000,");
    }

    #[test]
    fn test_reopening_does_not_duplicate_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap().to_string();

        MetricsLogger::new(&path).unwrap().log_epoch(1, 1.0, None).unwrap();
        MetricsLogger::new(&path).unwrap().log_epoch(2, 0.5, None).unwrap();

        let body = fs::read_to_string(dir.path().join("metrics.csv")).unwrap();
        assert_eq!(body.lines().filter(|l| l.starts_with("epoch")).count(), 1);
        assert_eq!(body.lines().count(), 3);
    }
}
