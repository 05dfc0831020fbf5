// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `prepare` — formats raw JSONL into chat splits
//   2. `train`   — fine-tunes the model on a prepared split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, PrepareArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "ssm-instruct",
    version = "0.1.0",
    about = "Prepare instruction-style chat data and fine-tune a state-space language model."
)]
pub struct Cli {
    /// The subcommand to run (prepare or train)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Prepare(args) => Self::run_prepare(args),
            Commands::Train(args)   => Self::run_train(args),
        }
    }

    /// Handles the `prepare` subcommand.
    /// Converts CLI args into a PrepareConfig and hands off to Layer 2.
    fn run_prepare(args: PrepareArgs) -> Result<()> {
        use crate::application::prepare_use_case::PrepareUseCase;

        tracing::info!("Preparing dataset from: {}", args.data);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = PrepareUseCase::new(args.into());
        let report = use_case.execute()?;

        println!(
            "Preparation complete: {} train records, {} validation records.",
            report.train_count, report.valid_count,
        );
        Ok(())
    }

    /// Handles the `train` subcommand.
    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting fine-tune on: {}", args.train_data);

        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Write};

    #[test]
    fn test_run_consumes_cli_and_dispatches_prepare() {
        let dir = tempfile::tempdir().unwrap();

        let data_path = dir.path().join("raw.jsonl");
        let mut f = fs::File::create(&data_path).unwrap();
        for i in 0..10 {
            writeln!(f, r#"{{"question": "q{i}", "expected_answer": "a{i}"}}"#).unwrap();
        }

        let prompt_path = dir.path().join("prompt.json");
        fs::write(&prompt_path, r#"{"prompt": "Be brief."}"#).unwrap();

        let out_dir = dir.path().join("out");
        let cli = Cli::try_parse_from([
            "ssm-instruct",
            "prepare",
            "--data", data_path.to_str().unwrap(),
            "--prompt-file", prompt_path.to_str().unwrap(),
            "--output-dir", out_dir.to_str().unwrap(),
            "--train-split", "0.8",
        ])
        .unwrap();

        // run(self) takes the parsed CLI by value and must hand the
        // subcommand args through without touching self again
        cli.run().unwrap();

        assert!(out_dir.join("train_alpaca_data.jsonl").exists());
        assert!(out_dir.join("valid_alpaca_data.jsonl").exists());
    }

    #[test]
    fn test_unknown_subcommand_is_a_parse_error() {
        assert!(Cli::try_parse_from(["ssm-instruct", "evaluate"]).is_err());
    }
}
