// ============================================================
// Layer 6 — Tokenizer Store
// ============================================================
// Manages tokenizer loading and the word-level fallback build.
//
// The normal path is loading an existing tokenizer.json (for a
// real fine-tune, the one shipped with the base model). When
// none exists, a word-level tokenizer is built from the prepared
// corpus so the pipeline works end to end without any external
// artefacts.
//
// In tokenizers 0.15, train_from_files requires Trainer::Model
// to equal ModelWrapper. The correct approach is to build the
// tokenizer JSON manually and load it, bypassing the trainer
// type mismatch entirely.
//
// The chat markers are registered as special tokens at fixed
// ids, so they survive tokenisation as single ids regardless of
// the word-level vocabulary:
//
//   <|pad|>=0  <|unk|>=1  <|im_start|>=2  <|im_end|>=3  <|endoftext|>=4
//
// Reference: Sennrich et al. (2016) BPE paper

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokenizers::Tokenizer;

pub const PAD_TOKEN: &str = "<|pad|>";
pub const UNK_TOKEN: &str = "<|unk|>";
pub const EOS_TOKEN: &str = "<|endoftext|>";

pub struct TokenizerStore {
    dir: PathBuf,
}

impl TokenizerStore {
    pub fn new(dir: impl Into<String>) -> Self {
        Self { dir: PathBuf::from(dir.into()) }
    }

    /// Load existing tokenizer or build a new one from texts
    pub fn load_or_build(&self, texts: &[String]) -> Result<Tokenizer> {
        let tok_path = self.dir.join("tokenizer.json");
        if tok_path.exists() {
            tracing::info!("Loading existing tokenizer from disk");
            self.load()
        } else {
            tracing::info!("Building new word-level tokenizer");
            self.build_and_save(texts)
        }
    }

    /// Load a previously saved tokenizer from JSON file
    pub fn load(&self) -> Result<Tokenizer> {
        let path = self.dir.join("tokenizer.json");
        Tokenizer::from_file(&path)
            .map_err(|e| anyhow::anyhow!(
                "Cannot load tokenizer from '{}': {}", path.display(), e
            ))
    }

    /// Build a word-level tokenizer from the corpus and persist
    /// it as tokenizer.json in the store directory.
    fn build_and_save(&self, texts: &[String]) -> Result<Tokenizer> {
        std::fs::create_dir_all(&self.dir).ok();

        let json = tokenizer_json(texts);
        let tok_path = self.dir.join("tokenizer.json");
        std::fs::write(&tok_path, serde_json::to_string_pretty(&json)?)
            .with_context(|| "Cannot write tokenizer JSON")?;

        tracing::info!("Tokenizer saved to '{}'", tok_path.display());

        // Load back as a proper Tokenizer instance
        Tokenizer::from_file(&tok_path)
            .map_err(|e| anyhow::anyhow!("Cannot reload tokenizer: {e}"))
    }
}

/// The pad id of a tokenizer, required for collation.
///
/// External tokenizers often ship without a dedicated pad token;
/// the end-of-text token stands in for it then. Padding positions
/// carry attention_mask 0 and IGNORE_INDEX labels, so the aliased
/// id is never attended to or trained on.
pub fn pad_id(tokenizer: &Tokenizer) -> Result<u32> {
    tokenizer
        .token_to_id(PAD_TOKEN)
        .or_else(|| tokenizer.token_to_id(EOS_TOKEN))
        .with_context(|| {
            format!("Tokenizer has neither '{PAD_TOKEN}' nor '{EOS_TOKEN}' token")
        })
}

/// Build a word-level tokenizer in memory (no files touched).
/// Used by the store's fallback path and directly by tests.
pub fn build_word_level(texts: &[String]) -> Result<Tokenizer> {
    let json = tokenizer_json(texts);
    Tokenizer::from_bytes(serde_json::to_vec(&json)?)
        .map_err(|e| anyhow::anyhow!("Cannot build tokenizer: {e}"))
}

/// Split a text the way the Whitespace pre-tokenizer will at encode
/// time: runs of word characters and runs of punctuation become
/// separate tokens, lowercased to match the normalizer. The chat
/// markers are cut out first — the encoder matches them as added
/// tokens before pre-tokenization, so a word abutting `<|im_end|>`
/// (the last word of every turn) must still land in the vocab on
/// its own.
fn pre_tokenize(text: &str) -> Vec<String> {
    let mut stripped = text.to_string();
    for marker in [PAD_TOKEN, UNK_TOKEN, "<|im_start|>", "<|im_end|>", EOS_TOKEN] {
        stripped = stripped.replace(marker, " ");
    }

    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_is_word = false;

    for ch in stripped.chars() {
        if ch.is_whitespace() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            continue;
        }
        let is_word = ch.is_alphanumeric() || ch == '_';
        if !current.is_empty() && is_word != current_is_word {
            tokens.push(std::mem::take(&mut current));
        }
        current_is_word = is_word;
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

/// Assemble a HuggingFace-format tokenizer JSON with a word-level
/// vocabulary built from token frequencies in `texts`.
fn tokenizer_json(texts: &[String]) -> serde_json::Value {
    // ── Step 1: Build vocabulary from token frequencies ───────────────────────
    use std::collections::HashMap;
    let mut freq: HashMap<String, usize> = HashMap::new();

    for text in texts {
        for token in pre_tokenize(text) {
            *freq.entry(token).or_insert(0) += 1;
        }
    }

    // Sort by frequency descending so common words get low ids
    let mut words: Vec<(String, usize)> = freq.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    // ── Step 2: Build vocab JSON ──────────────────────────────────────────────
    // Special tokens get fixed ids; real words start at 5
    let mut vocab = serde_json::json!({
        PAD_TOKEN:      0,
        UNK_TOKEN:      1,
        "<|im_start|>": 2,
        "<|im_end|>":   3,
        EOS_TOKEN:      4,
    });

    let mut next_id = 5usize;
    for (word, _) in &words {
        // Skip if already a special token
        if vocab.get(word).is_none() {
            vocab[word] = serde_json::json!(next_id);
            next_id += 1;
        }
    }

    // ── Step 3: Write tokenizer JSON in HuggingFace format ────────────────────
    // This format is what Tokenizer::from_file() expects
    serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [
            {"id": 0, "content": PAD_TOKEN,      "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 1, "content": UNK_TOKEN,      "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 2, "content": "<|im_start|>", "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 3, "content": "<|im_end|>",   "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true},
            {"id": 4, "content": EOS_TOKEN,      "single_word": false, "lstrip": false, "rstrip": false, "normalized": false, "special": true}
        ],
        "normalizer": {
            "type": "BertNormalizer",
            "clean_text": true,
            "handle_chinese_chars": true,
            "strip_accents": null,
            "lowercase": true
        },
        "pre_tokenizer": {
            "type": "Whitespace"
        },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": UNK_TOKEN
        }
    })
}
