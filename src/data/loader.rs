// ============================================================
// Layer 4 — Raw Record Loader
// ============================================================
// Loads the source dataset: a JSONL file where every line is
// one JSON object. The loader does not interpret the columns —
// it hands each row to the formatter as an untyped JSON map,
// because which fields matter is runtime configuration.
//
// Error policy:
//   - unreadable file        → fatal, error names the path
//   - malformed JSON line    → fatal, error names path and line
//   - non-object line (e.g. a bare array or string) → fatal
//
// A silently skipped row would shrink the training set without
// anyone noticing, so every row must parse.
//
// Reference: Rust Book §9 (Error Handling)
//            serde_json documentation

use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::{fs::File, io::{BufRead, BufReader}, path::Path};

/// One row of the source dataset, column names preserved.
pub type RawRecord = Map<String, Value>;

/// Loads raw JSONL rows from a single file.
pub struct RawRecordLoader {
    /// Path to the .jsonl file
    path: String,
}

impl RawRecordLoader {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Read every line of the file into a RawRecord.
    /// Blank lines are allowed (trailing newlines are common);
    /// anything else must be a JSON object.
    pub fn load_all(&self) -> Result<Vec<RawRecord>> {
        let file = File::open(Path::new(&self.path))
            .with_context(|| format!("Cannot open dataset file '{}'", self.path))?;

        let mut records = Vec::new();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Cannot read '{}' line {}", self.path, idx + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let value: Value = serde_json::from_str(&line).with_context(|| {
                format!("Malformed JSON in '{}' line {}", self.path, idx + 1)
            })?;

            match value {
                Value::Object(map) => records.push(map),
                other => bail!(
                    "Expected a JSON object in '{}' line {}, found {}",
                    self.path,
                    idx + 1,
                    json_kind(&other)
                ),
            }
        }

        tracing::info!("Loaded {} raw records from '{}'", records.len(), self.path);
        Ok(records)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}
