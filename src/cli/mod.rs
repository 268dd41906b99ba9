// ============================================================
// Layer 1 - CLI / Presentation Layer
// ============================================================
// Parses the command line with clap and hands each subcommand to
// its Layer 2 use case. Nothing here touches tensors or files.
//
//   doclm train    --train T --dev D --strategy hidden ...
//   doclm evaluate --test X
//   doclm sample   --context X --seeds but,so
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, SampleArgs, TrainArgs};

use crate::application::{
    evaluate_use_case::EvaluateUseCase, sample_use_case::SampleUseCase,
    train_use_case::TrainUseCase,
};

#[derive(Parser, Debug)]
#[command(
    name = "doclm",
    version,
    about = "Train, evaluate and sample document-context recurrent language models."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => run_train(args),
            Commands::Evaluate(args) => run_evaluate(args),
            Commands::Sample(args)   => run_sample(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    tracing::info!(
        "Training {} model on '{}' (dev '{}'), checkpoints in '{}'",
        args.strategy, args.train, args.dev, args.checkpoint_dir
    );
    TrainUseCase::new(args.into()).execute()
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    let summary = EvaluateUseCase::new(args.into()).execute()?;
    match summary.perplexity() {
        Some(ppl) => println!(
            "{} documents, {} words, PPL = {:.4}",
            summary.documents, summary.words, ppl
        ),
        None => println!("{} documents, no words to score", summary.documents),
    }
    println!("Per-document results: {}", summary.result_path.display());
    Ok(())
}

fn run_sample(args: SampleArgs) -> Result<()> {
    let path = SampleUseCase::new(args.into()).execute()?;
    println!("Samples written to {}", path.display());
    Ok(())
}
