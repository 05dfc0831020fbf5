// ============================================================
// Layer 4 — Train/Validation Splitter
// ============================================================
// Randomly shuffles records and splits them into two sets:
//   - Training set:   used to update model weights
//   - Validation set: used to measure performance on unseen data
//
// Why shuffle before splitting?
//   Source datasets are often ordered (all easy questions
//   first, or grouped by topic). Without shuffling, the
//   validation set would only contain one kind of record.
//   Shuffling ensures both sets have a representative mix.
//
// Uses Fisher-Yates shuffle via rand::seq::SliceRandom,
// the standard unbiased shuffle algorithm. A seed makes the
// split reproducible; without one, thread_rng is used and two
// runs may split differently.
//
// Reference: Rust Book §8 (Vectors)
//            rand crate documentation

use anyhow::{Context, Result};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::Serialize;
use std::{fs, io::Write, path::Path};

/// Randomly shuffle `records` and split into (train, validation).
///
/// # Arguments
/// * `records`        - All available records (consumed by this function)
/// * `train_fraction` - Proportion for training, e.g. 0.9 = 90%
/// * `seed`           - Optional RNG seed for reproducible splits
///
/// # Returns
/// A tuple (train_records, valid_records)
pub fn split_train_val<T>(
    mut records: Vec<T>,
    train_fraction: f64,
    seed: Option<u64>,
) -> (Vec<T>, Vec<T>) {
    // Fisher-Yates shuffle — every permutation is equally likely
    match seed {
        Some(s) => records.shuffle(&mut StdRng::seed_from_u64(s)),
        None    => records.shuffle(&mut rand::thread_rng()),
    }

    // Calculate the split index
    // e.g. 100 records * 0.9 = 90 → first 90 are training
    let total    = records.len();
    let split_at = ((total as f64) * train_fraction).round() as usize;

    // Clamp to valid range to avoid panics on tiny datasets
    let split_at = split_at.min(total);

    // split_off(n) removes elements [n..] from the Vec and returns them
    // After this: records = [0..split_at], valid = [split_at..total]
    let valid = records.split_off(split_at);

    tracing::debug!(
        "Dataset split: {} training, {} validation ({}% / {}%)",
        records.len(),
        valid.len(),
        (records.len() * 100) / total.max(1),
        (valid.len()   * 100) / total.max(1),
    );

    (records, valid)
}

/// Persist one partition as JSONL (one serialised record per line).
/// Creates parent directories as needed and returns the number of
/// lines written.
pub fn write_jsonl<T: Serialize>(records: &[T], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory '{}'", parent.display()))?;
    }

    let mut file = fs::File::create(path)
        .with_context(|| format!("Cannot create '{}'", path.display()))?;

    for record in records {
        let line = serde_json::to_string(record)
            .context("Cannot serialise record to JSON")?;
        writeln!(file, "{line}")
            .with_context(|| format!("Cannot write to '{}'", path.display()))?;
    }

    Ok(records.len())
}
