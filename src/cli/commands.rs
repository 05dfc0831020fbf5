// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `prepare` and `train`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::prepare_use_case::PrepareConfig;
use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Format a raw JSONL dataset into chat train/validation splits
    Prepare(PrepareArgs),

    /// Fine-tune the state-space model on a prepared split
    Train(TrainArgs),
}

/// All arguments for the `prepare` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct PrepareArgs {
    /// Raw dataset: a JSONL file with one record per line
    #[arg(long)]
    pub data: String,

    /// JSON file holding the shared system prompt: {"prompt": "..."}
    #[arg(long)]
    pub prompt_file: String,

    /// Directory to write the prepared splits into
    #[arg(long, default_value = "data")]
    pub output_dir: String,

    /// Suffix for the split file names:
    /// train_{suffix}.jsonl / valid_{suffix}.jsonl
    #[arg(long, default_value = "alpaca_data")]
    pub suffix: String,

    /// Record field holding the user-side instruction
    #[arg(long, default_value = "question")]
    pub instruction_field: String,

    /// Record field holding the assistant-side response
    #[arg(long, default_value = "expected_answer")]
    pub response_field: String,

    /// Proportion of records for training, e.g. 0.9 = 90%
    #[arg(long, default_value_t = 0.9)]
    pub train_split: f64,

    /// RNG seed for a reproducible shuffle; omit for a fresh
    /// shuffle every run
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Convert CLI PrepareArgs into the application-layer PrepareConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<PrepareArgs> for PrepareConfig {
    fn from(a: PrepareArgs) -> Self {
        PrepareConfig {
            data:              a.data,
            prompt_file:       a.prompt_file,
            output_dir:        a.output_dir,
            suffix:            a.suffix,
            instruction_field: a.instruction_field,
            response_field:    a.response_field,
            train_split:       a.train_split,
            seed:              a.seed,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Prepared training split (output of `prepare`)
    #[arg(long, default_value = "data/train_alpaca_data.jsonl")]
    pub train_data: String,

    /// Optional validation split; when given, validation loss is
    /// reported after every epoch
    #[arg(long)]
    pub valid_data: Option<String>,

    /// Directory holding tokenizer.json (a word-level fallback is
    /// built there from the training corpus when none exists)
    #[arg(long, default_value = "models")]
    pub tokenizer_dir: String,

    /// Directory for checkpoints, config, and metrics
    #[arg(long, default_value = "models")]
    pub output_dir: String,

    /// Number of full passes through the training data
    #[arg(long, default_value_t = 2)]
    pub epochs: usize,

    /// How fast the model learns — too high causes instability,
    /// too low causes slow convergence
    #[arg(long, default_value_t = 1e-5)]
    pub lr: f64,

    /// Number of samples processed together in one forward pass
    #[arg(long, default_value_t = 16)]
    pub batch_size: usize,

    /// Micro-batches accumulated before each optimiser step —
    /// multiplies the effective batch size without extra memory
    #[arg(long, default_value_t = 1)]
    pub grad_accum: usize,

    /// Maximum number of tokens per conversation; longer ones are
    /// truncated from the end
    #[arg(long, default_value_t = 2048)]
    pub max_length: usize,

    /// Save a checkpoint every N optimiser steps (0 = only at the end)
    #[arg(long, default_value_t = 500)]
    pub save_steps: usize,

    /// Print the running loss every N optimiser steps
    #[arg(long, default_value_t = 5)]
    pub log_every: usize,

    /// Optimiser variant: adamw, adam, or sgd
    #[arg(long, default_value = "adamw")]
    pub optimizer: String,

    /// Hidden dimension of the model — every token is represented
    /// as a vector of this size
    #[arg(long, default_value_t = 256)]
    pub d_model: usize,

    /// Number of stacked state-space blocks
    #[arg(long, default_value_t = 4)]
    pub num_layers: usize,

    /// Inner dimension of the feed-forward network
    /// Typically 4x d_model
    #[arg(long, default_value_t = 1024)]
    pub d_ff: usize,

    /// Dropout probability — randomly zeroes activations during training
    /// to prevent overfitting
    #[arg(long, default_value_t = 0.1)]
    pub dropout: f64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            train_data:    a.train_data,
            valid_data:    a.valid_data,
            tokenizer_dir: a.tokenizer_dir,
            output_dir:    a.output_dir,
            epochs:        a.epochs,
            lr:            a.lr,
            batch_size:    a.batch_size,
            grad_accum:    a.grad_accum,
            max_length:    a.max_length,
            save_steps:    a.save_steps,
            log_every:     a.log_every,
            optimizer:     a.optimizer,
            d_model:       a.d_model,
            num_layers:    a.num_layers,
            d_ff:          a.d_ff,
            dropout:       a.dropout,
        }
    }
}
