// ============================================================
// Layer 4 — Conversation Dataset
// ============================================================
// Implements Burn's Dataset trait over a prepared JSONL split.
//
// Construction is eager: every line is parsed into a
// ConversationRecord up front, so a malformed line fails with
// its line number before training starts. Tokenisation is lazy:
// get(i) renders, encodes, and builds labels on demand, which
// keeps memory proportional to the record count rather than the
// token count.
//
// Labels:
//   Each label position mirrors the input id at the same
//   position, except prompt tokens (system turn, user turn,
//   template markers) which hold IGNORE_INDEX. The trainer
//   skips IGNORE_INDEX positions, so only assistant content
//   contributes to the loss. The prompt boundary comes from
//   tokenising the prompt prefix reported by the template.
//
// Truncation:
//   Sequences longer than max_length keep their first
//   max_length tokens. No padding happens here — padding is
//   batch-relative and belongs to the batcher.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use anyhow::{bail, Context, Result};
use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::{fs::File, io::{BufRead, BufReader}, sync::Arc};
use tokenizers::Tokenizer;

use crate::domain::conversation::ConversationRecord;
use crate::domain::traits::ChatTemplate;

/// Label value excluded from the loss.
pub const IGNORE_INDEX: i64 = -100;

// ─── TokenizedExample ─────────────────────────────────────────────────────────
/// One tokenised training example. Unpadded; input_ids and labels
/// always have the same length, at most max_length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenizedExample {
    pub input_ids: Vec<u32>,
    pub labels:    Vec<i64>,
}

// ─── ConversationDataset ──────────────────────────────────────────────────────
pub struct ConversationDataset {
    records:    Vec<ConversationRecord>,
    tokenizer:  Arc<Tokenizer>,
    template:   Arc<dyn ChatTemplate>,
    max_length: usize,
}

/// Parse a prepared JSONL split into conversation records.
/// Fails if the file is missing or any line is malformed, naming
/// the line number either way.
pub fn read_conversations(path: &str) -> Result<Vec<ConversationRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open split file '{path}'"))?;

    let mut records = Vec::new();

    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line
            .with_context(|| format!("Cannot read '{path}' line {}", idx + 1))?;

        if line.trim().is_empty() {
            continue;
        }

        let record: ConversationRecord = serde_json::from_str(&line)
            .with_context(|| {
                format!("Malformed conversation in '{path}' line {}", idx + 1)
            })?;
        records.push(record);
    }

    Ok(records)
}

impl ConversationDataset {
    /// Wrap already-parsed conversations. Fails on an empty record
    /// list or a zero max_length — both are construction-time shape
    /// errors, not something to discover mid-training.
    pub fn new(
        records: Vec<ConversationRecord>,
        tokenizer: Arc<Tokenizer>,
        template: Arc<dyn ChatTemplate>,
        max_length: usize,
    ) -> Result<Self> {
        if max_length < 1 {
            bail!("max_length must be at least 1, got {max_length}");
        }
        if records.is_empty() {
            bail!("Dataset contains no records");
        }

        // Every record must tokenize up front. A failure discovered
        // in get() could only be reported as a missing example, which
        // the data loader reads as end-of-data — the epoch would
        // silently shorten instead of the run failing.
        for (idx, record) in records.iter().enumerate() {
            let rendered = template.render(record);
            tokenizer
                .encode(rendered.text.as_str(), false)
                .map_err(|e| {
                    anyhow::anyhow!("Conversation {} does not tokenize: {e}", idx + 1)
                })?;
        }

        Ok(Self { records, tokenizer, template, max_length })
    }

    /// Load a prepared JSONL split from disk.
    pub fn from_jsonl(
        path: &str,
        tokenizer: Arc<Tokenizer>,
        template: Arc<dyn ChatTemplate>,
        max_length: usize,
    ) -> Result<Self> {
        let records = read_conversations(path)?;
        if records.is_empty() {
            bail!("Split file '{path}' contains no records");
        }

        tracing::info!("Dataset '{path}': {} conversations", records.len());
        Self::new(records, tokenizer, template, max_length)
    }
}

impl Dataset<TokenizedExample> for ConversationDataset {
    /// Render → tokenise → truncate → label. Pure with respect to
    /// the dataset state, so calling twice with the same index
    /// yields the same example.
    fn get(&self, index: usize) -> Option<TokenizedExample> {
        let record   = self.records.get(index)?;
        let rendered = self.template.render(record);

        // Both encodes were validated at construction (the prompt is
        // a prefix of the validated text), so these arms cannot fail
        // on a dataset that was successfully built
        let full = match self.tokenizer.encode(rendered.text.as_str(), false) {
            Ok(encoding) => encoding,
            Err(e) => {
                tracing::error!("Tokenisation failed for record {index}: {e}");
                return None;
            }
        };

        // The prompt prefix is tokenised separately; its length in
        // tokens is how many leading labels get masked.
        let prompt = &rendered.text[..rendered.response_start];
        let prompt_len = match self.tokenizer.encode(prompt, false) {
            Ok(encoding) => encoding.get_ids().len(),
            Err(e) => {
                tracing::error!("Tokenisation failed for record {index} prompt: {e}");
                return None;
            }
        };

        let mut input_ids: Vec<u32> = full.get_ids().to_vec();
        input_ids.truncate(self.max_length);

        let masked = prompt_len.min(input_ids.len());
        let labels: Vec<i64> = input_ids
            .iter()
            .enumerate()
            .map(|(i, &id)| if i < masked { IGNORE_INDEX } else { id as i64 })
            .collect();

        Some(TokenizedExample { input_ids, labels })
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::template::ChatMlTemplate;
    use crate::domain::traits::ChatTemplate as _;
    use crate::infra::tokenizer_store;
    use std::io::Write;

    fn fixture(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    fn record_line(question: &str, answer: &str) -> String {
        format!(
            r#"{{"messages":[{{"role":"system","content":"Answer briefly."}},{{"role":"user","content":"{question}"}},{{"role":"assistant","content":"{answer}"}}]}}"#
        )
    }

    /// Tokenizer whose vocabulary covers the fixture conversations.
    fn tokenizer_for(lines: &[String]) -> Arc<Tokenizer> {
        let corpus: Vec<String> = lines
            .iter()
            .map(|l| {
                let record: ConversationRecord = serde_json::from_str(l).unwrap();
                ChatMlTemplate.render(&record).text
            })
            .collect();
        Arc::new(tokenizer_store::build_word_level(&corpus).unwrap())
    }

    fn dataset(lines: &[String], max_length: usize) -> ConversationDataset {
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let file = fixture(&refs);
        let ds = ConversationDataset::from_jsonl(
            file.path().to_str().unwrap(),
            tokenizer_for(lines),
            Arc::new(ChatMlTemplate),
            max_length,
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_lengths_match_and_respect_max_length() {
        let lines = vec![record_line("what is the largest planet", "jupiter")];
        let ds = dataset(&lines, 2048);
        let example = ds.get(0).unwrap();
        assert_eq!(example.input_ids.len(), example.labels.len());
        assert!(example.input_ids.len() <= 2048);
        assert!(!example.input_ids.is_empty());
    }

    #[test]
    fn test_truncation_keeps_leading_tokens() {
        let lines = vec![record_line("one two three four five six seven", "eight")];
        let full = dataset(&lines, 2048).get(0).unwrap();
        assert!(full.input_ids.len() > 10);

        let truncated = dataset(&lines, 10).get(0).unwrap();
        assert_eq!(truncated.input_ids.len(), 10);
        assert_eq!(truncated.labels.len(), 10);
        assert_eq!(truncated.input_ids[..], full.input_ids[..10]);
    }

    #[test]
    fn test_prompt_is_masked_response_is_not() {
        let lines = vec![record_line("what is 2+2", "four")];
        let example = dataset(&lines, 2048).get(0).unwrap();

        // Leading (prompt) positions carry IGNORE_INDEX
        assert_eq!(example.labels[0], IGNORE_INDEX);

        // At least one trainable position exists, and every
        // trainable label mirrors its input id
        let trainable: Vec<(usize, i64)> = example
            .labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l != IGNORE_INDEX)
            .map(|(i, &l)| (i, l))
            .collect();
        assert!(!trainable.is_empty());
        for (i, label) in trainable {
            assert_eq!(label, example.input_ids[i] as i64);
        }
    }

    #[test]
    fn test_every_index_yields_an_example() {
        // A constructed dataset must serve all of its indices; a None
        // mid-range would silently end the epoch early in the loader
        let lines = vec![
            record_line("first question", "first answer"),
            record_line("second question", "second answer"),
            record_line("third question", "third answer"),
        ];
        let ds = dataset(&lines, 64);
        assert_eq!(ds.len(), 3);
        for i in 0..ds.len() {
            assert!(ds.get(i).is_some(), "index {i} returned no example");
        }
        assert!(ds.get(3).is_none());
    }

    #[test]
    fn test_get_is_idempotent() {
        let lines = vec![record_line("repeat after me", "after me")];
        let ds = dataset(&lines, 64);
        assert_eq!(ds.get(0), ds.get(0));
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let line = record_line("q", "a");
        let file = fixture(&[line.as_str(), "{broken"]);
        // .err() rather than .unwrap_err(): the Ok side holds a trait
        // object and has no Debug impl
        let err = ConversationDataset::from_jsonl(
            file.path().to_str().unwrap(),
            tokenizer_for(&[line]),
            Arc::new(ChatMlTemplate),
            64,
        )
        .err()
        .unwrap();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn test_zero_max_length_is_rejected() {
        let line = record_line("q", "a");
        let file = fixture(&[line.as_str()]);
        let err = ConversationDataset::from_jsonl(
            file.path().to_str().unwrap(),
            tokenizer_for(&[line]),
            Arc::new(ChatMlTemplate),
            0,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("max_length"));
    }

    #[test]
    fn test_empty_file_is_rejected() {
        let line = record_line("q", "a");
        let file = fixture(&[]);
        let err = ConversationDataset::from_jsonl(
            file.path().to_str().unwrap(),
            tokenizer_for(&[line]),
            Arc::new(ChatMlTemplate),
            64,
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("no records"));
    }
}
