// ============================================================
// Layer 2 — PrepareUseCase
// ============================================================
// Orchestrates the data preparation pipeline in order:
//
//   Step 1: Read the system prompt file   (Layer 2 - here)
//   Step 2: Load raw JSONL records        (Layer 4 - data)
//   Step 3: Format into conversations     (Layer 4 - data)
//   Step 4: Shuffle + train/valid split   (Layer 4 - data)
//   Step 5: Persist both partitions       (Layer 4 - data)
//
// Output files:
//   {output_dir}/train_{suffix}.jsonl
//   {output_dir}/valid_{suffix}.jsonl
//
// Reference: Rust Book §13 (Iterators and Closures)

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::data::{
    formatter::{FieldSelection, RecordFormatter},
    loader::RawRecordLoader,
    splitter::{split_train_val, write_jsonl},
};

// ─── Preparation Configuration ────────────────────────────────────────────────
// All settings for a preparation run. Serialisable so a run can
// be reproduced from a saved config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareConfig {
    pub data:              String,
    pub prompt_file:       String,
    pub output_dir:        String,
    pub suffix:            String,
    pub instruction_field: String,
    pub response_field:    String,
    pub train_split:       f64,
    pub seed:              Option<u64>,
}

/// The two partition counts, reported back to the CLI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrepareReport {
    pub train_count: usize,
    pub valid_count: usize,
}

// ─── PrepareUseCase ───────────────────────────────────────────────────────────
// Owns the config and runs the full preparation pipeline.
pub struct PrepareUseCase {
    config: PrepareConfig,
}

impl PrepareUseCase {
    /// Create a new PrepareUseCase with the given configuration
    pub fn new(config: PrepareConfig) -> Self {
        Self { config }
    }

    /// Execute the full preparation pipeline end to end
    pub fn execute(&self) -> Result<PrepareReport> {
        let cfg = &self.config;

        if !(0.0..=1.0).contains(&cfg.train_split) {
            bail!("train_split must be between 0 and 1, got {}", cfg.train_split);
        }

        // ── Step 1: Read the system prompt ────────────────────────────────────
        // A JSON file with a single "prompt" field, shared by every
        // conversation in the run
        let system_prompt = read_system_prompt(&cfg.prompt_file)?;

        // ── Step 2: Load raw records ──────────────────────────────────────────
        tracing::info!("Loading raw records from '{}'", cfg.data);
        let records = RawRecordLoader::new(&cfg.data).load_all()?;

        // ── Step 3: Format into conversations ─────────────────────────────────
        // Every record becomes system/user/assistant; the field
        // selection is validated against the first record so a
        // wrong column name fails before any work is done
        let formatter = RecordFormatter::new(
            system_prompt,
            FieldSelection::new(&cfg.instruction_field, &cfg.response_field),
        );
        let conversations = formatter.format_all(&records)?;
        tracing::info!("Formatted {} conversations", conversations.len());

        // ── Step 4: Shuffle and split ─────────────────────────────────────────
        let (train, valid) = split_train_val(conversations, cfg.train_split, cfg.seed);

        // ── Step 5: Persist both partitions ───────────────────────────────────
        let out = Path::new(&cfg.output_dir);
        let train_path = out.join(format!("train_{}.jsonl", cfg.suffix));
        let valid_path = out.join(format!("valid_{}.jsonl", cfg.suffix));

        let train_count = write_jsonl(&train, &train_path)?;
        let valid_count = write_jsonl(&valid, &valid_path)?;

        tracing::info!(
            "Wrote {} train records to '{}' and {} valid records to '{}'",
            train_count, train_path.display(),
            valid_count, valid_path.display(),
        );

        Ok(PrepareReport { train_count, valid_count })
    }
}

/// Read the shared system prompt from a JSON file of the form
/// {"prompt": "..."}.
fn read_system_prompt(path: &str) -> Result<String> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("Cannot read prompt file '{path}'"))?;

    let value: serde_json::Value = serde_json::from_str(&body)
        .with_context(|| format!("Malformed JSON in prompt file '{path}'"))?;

    match value.get("prompt").and_then(|p| p.as_str()) {
        Some(prompt) => Ok(prompt.to_string()),
        None => bail!("Prompt file '{path}' has no string 'prompt' field"),
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{ConversationRecord, Role};
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path.to_str().unwrap().to_string()
    }

    fn config(dir: &Path, rows: usize) -> PrepareConfig {
        let mut data = String::new();
        for i in 0..rows {
            data.push_str(&format!(
                "{{\"question\": \"q{i}\", \"expected_answer\": \"a{i}\"}}\n"
            ));
        }
        PrepareConfig {
            data:              write_file(dir, "raw.jsonl", &data),
            prompt_file:       write_file(dir, "prompt.json", r#"{"prompt": "Be concise."}"#),
            output_dir:        dir.join("out").to_str().unwrap().to_string(),
            suffix:            "alpaca_data".into(),
            instruction_field: "question".into(),
            response_field:    "expected_answer".into(),
            train_split:       0.9,
            seed:              Some(3),
        }
    }

    #[test]
    fn test_end_to_end_prepare() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path(), 100);
        let out_dir = cfg.output_dir.clone();

        let report = PrepareUseCase::new(cfg).execute().unwrap();
        assert_eq!(report.train_count, 90);
        assert_eq!(report.valid_count, 10);

        // Every persisted line parses back into a three-turn conversation
        let body = fs::read_to_string(
            Path::new(&out_dir).join("train_alpaca_data.jsonl"),
        ).unwrap();
        assert_eq!(body.lines().count(), 90);
        for line in body.lines() {
            let record: ConversationRecord = serde_json::from_str(line).unwrap();
            assert_eq!(record.messages.len(), 3);
            assert_eq!(record.messages[0].role, Role::System);
            assert_eq!(record.messages[0].content, "Be concise.");
        }
    }

    #[test]
    fn test_invalid_split_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5);
        cfg.train_split = 1.5;
        let err = PrepareUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("train_split"));
    }

    #[test]
    fn test_missing_prompt_field_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5);
        cfg.prompt_file = write_file(dir.path(), "bad.json", r#"{"note": "no prompt"}"#);
        let err = PrepareUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn test_wrong_field_name_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = config(dir.path(), 5);
        cfg.instruction_field = "instruction".into();
        let err = PrepareUseCase::new(cfg).execute().unwrap_err();
        assert!(err.to_string().contains("instruction"));
    }
}
