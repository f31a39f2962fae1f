// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains (or resumes) a model on a parallel corpus
//   2. `infer` — translates a file with a saved checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, InferArgs, TrainArgs};

use crate::application::session::prepare_config;

#[derive(Parser, Debug)]
#[command(
    name = "nmt-trainer",
    version,
    about = "Train a sequence-to-sequence translation model, then translate files with it."
)]
pub struct Cli {
    /// The subcommand to run (train or infer)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// --verbose, needed before tracing is set up.
    pub fn verbose(&self) -> bool {
        match &self.command {
            Commands::Train(args) => args.shared.verbose,
            Commands::Infer(args) => args.shared.verbose,
        }
    }

    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Infer(args) => run_infer(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let params = args.shared.params_options();
    let config = prepare_config(args.into(), &params)?;
    let checkpoint = config.checkpoint_dir()?;

    let state = TrainUseCase::new(config).execute()?;

    println!(
        "Training complete after {} steps. Checkpoint saved to '{}'.",
        state.global_step,
        checkpoint.display()
    );
    Ok(())
}

fn run_infer(args: InferArgs) -> Result<()> {
    use crate::application::infer_use_case::InferUseCase;

    let params = args.shared.params_options();
    let options = args.infer_options();
    let config = prepare_config(args.into(), &params)?;

    let report = InferUseCase::new(config, options).execute()?;

    println!("Translated {} sentences into '{}'.", report.translated, report.output.display());
    Ok(())
}
