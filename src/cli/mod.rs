// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains BiDAF, resuming from checkpoints
//   2. `test`  — evaluates the latest snapshot on the test split
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, DataArgs, TestArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "bidaf-qa",
    version,
    about = "Train and evaluate a BiDAF span-prediction model on processed SQuAD data."
)]
pub struct Cli {
    #[command(flatten)]
    pub data: DataArgs,

    /// The subcommand to run (train or test)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args, self.data),
            Commands::Test(args)  => run_test(args, self.data),
        }
    }
}

/// Handles the `train` subcommand.
fn run_train(args: TrainArgs, data: DataArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Train mode, data in: {}", data.data_dir);

    // Convert CLI args → application config (separates presentation from domain)
    let outcome = TrainUseCase::new(args.into_config(data)).execute()?;

    match outcome.epochs.last() {
        Some(m) => println!(
            "Trained epochs {}..={}: p1 acc {:.3}%, p2 acc {:.3}%",
            outcome.start_epoch,
            m.epoch,
            100.0 * m.p1_acc,
            100.0 * m.p2_acc
        ),
        None => println!("Nothing to train from epoch {}: 0 epochs requested.", outcome.start_epoch),
    }
    Ok(())
}

/// Handles the `test` subcommand.
fn run_test(args: TestArgs, data: DataArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    tracing::info!("Test mode, data in: {}", data.data_dir);

    let predictions = args.predictions.clone();
    let report = TestUseCase::new(args.into_config(data)).execute()?;

    println!(
        "p1 acc: {:.3}%, p2 acc: {:.3}%, exact span: {:.3}%",
        100.0 * report.p1_acc(),
        100.0 * report.p2_acc(),
        100.0 * report.exact_match()
    );
    println!("Predictions written to {predictions}");
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["bidaf-qa", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config(cli.data);

        assert_eq!(cfg.data.batch_size, 32);
        assert_eq!(cfg.data.filter_widths, vec![5]);
        assert_eq!(cfg.data.seed, 1111);
        assert!(cfg.data.show_progress);
        assert!(!cfg.data.use_cache);
        assert_eq!(cfg.epochs, 3);
        assert_eq!(cfg.lr, 1e-3);
        assert_eq!(cfg.ema_decay, 0.999);
        assert_eq!(Path::new(&cfg.resume), Path::new("./checkpoints/model_best"));
    }

    #[test]
    fn test_resume_follows_checkpoint_dir() {
        let cli = Cli::try_parse_from(["bidaf-qa", "--checkpoint-dir", "runs/a", "train"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config(cli.data);
        assert_eq!(Path::new(&cfg.resume), Path::new("runs/a/model_best"));
    }

    #[test]
    fn test_global_flags_on_either_side() {
        let cli = Cli::try_parse_from([
            "bidaf-qa", "--batch-size", "8", "test", "--use-cache",
            "--filter-width", "3", "--filter-width", "5",
            "--predictions", "out.json",
        ])
        .unwrap();
        let Commands::Test(args) = cli.command else { panic!("expected test") };
        let cfg = args.into_config(cli.data);

        assert_eq!(cfg.data.batch_size, 8);
        assert!(cfg.data.use_cache);
        assert_eq!(cfg.data.filter_widths, vec![3, 5]);
        assert_eq!(cfg.predictions, "out.json");
    }

    #[test]
    fn test_train_flags() {
        let cli = Cli::try_parse_from([
            "bidaf-qa", "train", "--epochs", "1", "--lr", "0.5",
            "--resume", "ckpt/epoch-2", "--no-progress",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = args.into_config(cli.data);

        assert_eq!(cfg.epochs, 1);
        assert_eq!(cfg.lr, 0.5);
        assert_eq!(cfg.resume, "ckpt/epoch-2");
        assert!(!cfg.data.show_progress);
    }

    #[test]
    fn test_unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["bidaf-qa", "ask"]).is_err());
    }
}
