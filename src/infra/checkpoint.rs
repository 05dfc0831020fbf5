// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// What gets saved per checkpoint:
//   1. Model weights (.mpk.gz file) — all learned parameters
//   2. latest_step.json             — which step was last saved
//   3. train_config.json            — the full training config
//
// Why save the config separately?
//   When resuming or inspecting a run, we need to know the
//   exact model architecture (d_model, num_layers, etc.) to
//   rebuild the model before loading the weights into it.
//   Without the config, we can't reconstruct the model.
//
// Burn's CompactRecorder:
//   - Serialises model parameters to MessagePack format
//   - Compresses with gzip for smaller file size
//   - Type-safe: loading fails if architecture doesn't match
//
// File naming convention:
//   models/
//     model_step_500.mpk.gz  ← weights after 500 optimiser steps
//     model_step_1000.mpk.gz
//     ...
//     latest_step.json       ← contains the latest step number
//     train_config.json      ← training configuration
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
    tensor::backend::AutodiffBackend,
};

use crate::application::train_use_case::TrainConfig;
use crate::ml::model::SsmLm;

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    /// Path to the directory where checkpoints are stored
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a new CheckpointManager.
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<String>) -> Self {
        let dir = PathBuf::from(dir.into());
        // create_dir_all creates parent directories too, like `mkdir -p`
        // .ok() ignores the error if the directory already exists
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// True if a previous run left weights behind to resume from.
    pub fn has_checkpoint(&self) -> bool {
        self.dir.join("latest_step.json").exists()
    }

    /// Save model weights at a given optimiser step.
    ///
    /// Uses Burn's CompactRecorder which:
    ///   1. Calls model.into_record() to extract all parameters
    ///   2. Serialises to MessagePack binary format
    ///   3. Compresses with gzip
    ///   4. Writes to {dir}/model_step_{step}.mpk.gz
    pub fn save_model<B: AutodiffBackend>(
        &self,
        model: &SsmLm<B>,
        step:  usize,
    ) -> Result<()> {
        // Build the file path (without extension — recorder adds it)
        let path = self.dir.join(format!("model_step_{step}"));

        // Save model weights using CompactRecorder
        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| {
                format!("Failed to save checkpoint to '{}'", path.display())
            })?;

        // Update the latest step pointer so a resumed run knows
        // which file to load
        let latest_path = self.dir.join("latest_step.json");
        fs::write(&latest_path, serde_json::to_string(&step)?)
            .with_context(|| "Failed to write latest_step.json")?;

        tracing::debug!("Saved checkpoint: step {}", step);
        Ok(())
    }

    /// Load model weights from the latest saved checkpoint.
    ///
    /// Steps:
    ///   1. Read latest_step.json to find the step number
    ///   2. Load the corresponding .mpk.gz file
    ///   3. Call model.load_record() to restore weights
    ///
    /// The model parameter must have the correct architecture
    /// (matching the saved checkpoint) or loading will fail.
    pub fn load_model<B: Backend>(
        &self,
        model:  SsmLm<B>,
        device: &B::Device,
    ) -> Result<SsmLm<B>> {
        // Find out which step was saved last
        let step = self.latest_step()?;
        let path = self.dir.join(format!("model_step_{step}"));

        tracing::info!("Loading checkpoint from step {}", step);

        // Load the serialised record from disk
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!(
                    "Cannot load checkpoint '{}'. Does the saved architecture match?",
                    path.display()
                )
            })?;

        // Restore the weights into the model
        // load_record() returns a new model with the loaded weights
        Ok(model.load_record(record))
    }

    /// Save the training configuration to JSON.
    ///
    /// Called before training starts so a later run can
    /// reconstruct the exact model architecture.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");

        // serde_json::to_string_pretty adds indentation for readability
        let json = serde_json::to_string_pretty(cfg)?;

        fs::write(&path, json)
            .with_context(|| {
                format!("Cannot write config to '{}'", path.display())
            })?;

        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// Load the training configuration from JSON.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");

        let json = fs::read_to_string(&path)
            .with_context(|| {
                format!(
                    "Cannot read config from '{}'. \
                     Has a training run been started in this directory?",
                    path.display()
                )
            })?;

        // Deserialise JSON back into TrainConfig struct
        Ok(serde_json::from_str(&json)?)
    }

    /// Read latest_step.json and return the step number.
    fn latest_step(&self) -> Result<usize> {
        let path = self.dir.join("latest_step.json");

        let s = fs::read_to_string(&path)
            .with_context(|| {
                "Cannot find 'latest_step.json'. \
                 No checkpoint exists in this directory."
            })?;

        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::model::SsmLmConfig;
    use burn::backend::{ndarray::NdArray, Autodiff};

    type B = Autodiff<NdArray<f32>>;

    fn sample_config(output_dir: &str) -> TrainConfig {
        TrainConfig {
            train_data:    "data/train_alpaca_data.jsonl".into(),
            valid_data:    None,
            tokenizer_dir: "models".into(),
            output_dir:    output_dir.into(),
            epochs:        2,
            lr:            1e-5,
            batch_size:    16,
            grad_accum:    1,
            max_length:    2048,
            save_steps:    500,
            log_every:     5,
            optimizer:     "adamw".into(),
            d_model:       64,
            num_layers:    2,
            d_ff:          128,
            dropout:       0.1,
        }
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_str().unwrap());

        let cfg = sample_config(dir.path().to_str().unwrap());
        manager.save_config(&cfg).unwrap();
        let loaded = manager.load_config().unwrap();

        assert_eq!(loaded.epochs, 2);
        assert_eq!(loaded.d_model, 64);
        assert_eq!(loaded.optimizer, "adamw");
    }

    #[test]
    fn test_save_then_load_model() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();

        let model: SsmLm<B> = SsmLmConfig::new(16, 8, 1, 16, 0.0).init(&device);
        manager.save_model(&model, 7).unwrap();
        assert!(manager.has_checkpoint());

        let fresh: SsmLm<B> = SsmLmConfig::new(16, 8, 1, 16, 0.0).init(&device);
        manager.load_model(fresh, &device).unwrap();
    }

    #[test]
    fn test_missing_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().to_str().unwrap());
        let device = Default::default();

        assert!(!manager.has_checkpoint());
        let model: SsmLm<B> = SsmLmConfig::new(16, 8, 1, 16, 0.0).init(&device);
        assert!(manager.load_model(model, &device).is_err());
    }
}
