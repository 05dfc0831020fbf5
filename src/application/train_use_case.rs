// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full fine-tuning pipeline in order:
//
//   Step 1: Read the prepared train split  (Layer 4 - data)
//   Step 2: Load / build tokenizer         (Layer 6 - infra)
//   Step 3: Build train dataset            (Layer 4 - data)
//   Step 4: Build validation dataset       (Layer 4 - data)
//   Step 5: Save config                    (Layer 6 - infra)
//   Step 6: Run training loop              (Layer 5 - ml)
//
// Reference: Rust Book §13 (Iterators and Closures)
//            Burn Book §5 (Training)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    dataset::{read_conversations, ConversationDataset},
    template::ChatMlTemplate,
};
use crate::domain::traits::ChatTemplate;
use crate::infra::{
    checkpoint::CheckpointManager,
    metrics::MetricsLogger,
    tokenizer_store::{self, TokenizerStore},
};
use crate::ml::trainer::run_training;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded for
// resuming or inspection. The #[derive(Serialize, Deserialize)]
// macros from serde handle reading/writing this struct to JSON
// automatically.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub train_data:    String,
    pub valid_data:    Option<String>,
    pub tokenizer_dir: String,
    pub output_dir:    String,
    pub epochs:        usize,
    pub lr:            f64,
    pub batch_size:    usize,
    pub grad_accum:    usize,
    pub max_length:    usize,
    pub save_steps:    usize,
    pub log_every:     usize,
    pub optimizer:     String,
    pub d_model:       usize,
    pub num_layers:    usize,
    pub d_ff:          usize,
    pub dropout:       f64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            train_data:    "data/train_alpaca_data.jsonl".to_string(),
            valid_data:    None,
            tokenizer_dir: "models".to_string(),
            output_dir:    "models".to_string(),
            epochs:        2,
            lr:            1e-5,
            batch_size:    16,
            grad_accum:    1,
            max_length:    2048,
            save_steps:    500,
            log_every:     5,
            optimizer:     "adamw".to_string(),
            d_model:       256,
            num_layers:    4,
            d_ff:          1024,
            dropout:       0.1,
        }
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full fine-tuning pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    /// Create a new TrainUseCase with the given configuration
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full fine-tuning pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;
        let template: Arc<dyn ChatTemplate> = Arc::new(ChatMlTemplate);

        // ── Step 1: Read the prepared train split ─────────────────────────────
        tracing::info!("Reading train split '{}'", cfg.train_data);
        let train_records = read_conversations(&cfg.train_data)?;
        tracing::info!("Loaded {} train conversations", train_records.len());

        // ── Step 2: Load / build tokenizer ────────────────────────────────────
        // If a tokenizer.json exists in the tokenizer directory,
        // load it. Otherwise build a word-level fallback from the
        // rendered training corpus so the run is self-contained.
        let corpus: Vec<String> = train_records
            .iter()
            .map(|record| template.render(record).text)
            .collect();

        let tok_store = TokenizerStore::new(&cfg.tokenizer_dir);
        let tokenizer = Arc::new(tok_store.load_or_build(&corpus)?);

        let vocab_size = tokenizer.get_vocab_size(true);
        let pad_id     = tokenizer_store::pad_id(&tokenizer)?;
        tracing::info!("Tokenizer ready: vocab={}, pad_id={}", vocab_size, pad_id);

        // ── Step 3: Build train dataset ───────────────────────────────────────
        let train_dataset = ConversationDataset::new(
            train_records,
            tokenizer.clone(),
            template.clone(),
            cfg.max_length,
        )?;

        // ── Step 4: Build validation dataset (optional) ───────────────────────
        let valid_dataset = match &cfg.valid_data {
            Some(path) => Some(ConversationDataset::from_jsonl(
                path,
                tokenizer.clone(),
                template.clone(),
                cfg.max_length,
            )?),
            None => None,
        };

        // ── Step 5: Save config for resuming / inspection ─────────────────────
        let ckpt_manager = CheckpointManager::new(&cfg.output_dir);
        ckpt_manager.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 6: Run training loop (Layer 5) ───────────────────────────────
        run_training(
            cfg,
            vocab_size,
            pad_id,
            train_dataset,
            valid_dataset,
            ckpt_manager,
            metrics,
        )?;

        Ok(())
    }
}
