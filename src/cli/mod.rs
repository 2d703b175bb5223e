// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Parses arguments with clap, routes to a use case and prints
// the result. No computation happens here.

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, EvaluateArgs, ModelArgs, PredictArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "hand-pose-vit",
    version,
    about = "Train a Vision Transformer to predict 2D hand keypoint heatmaps."
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
            Commands::Predict(args)  => run_predict(args),
            Commands::Summary(args)  => run_summary(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let use_case = TrainUseCase::new(args.into_config()?);
    let outcome  = use_case.execute()?;

    let last = |v: &[f64]| v.last().copied().unwrap_or(f64::NAN);
    println!(
        "Training finished after {} epochs{}. Train loss {:.6}, val loss {:.6}.",
        outcome.epochs_run,
        if outcome.stopped_early { " (stopped early)" } else { "" },
        last(&outcome.history.train),
        last(&outcome.history.val),
    );
    Ok(())
}

fn run_evaluate(args: EvaluateArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let report = EvaluateUseCase::new(args.into()).evaluate()?;
    println!("Samples:    {}", report.samples);
    println!("IoU loss:   {:.6}", report.loss);
    println!("Mean error: {:.4}", report.mean_error);
    println!("PCK@{:.2}:   {:.1}%", report.pck_threshold, report.pck * 100.0);
    Ok(())
}

fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::evaluate_use_case::EvaluateUseCase;

    let predictions = EvaluateUseCase::new(args.into()).predict()?;
    for (i, p) in predictions.iter().enumerate() {
        println!("Hand {} (mean confidence {:.3})", i + 1, p.predicted.mean_confidence());
        for (k, (pred, truth)) in p.predicted.keypoints.iter().zip(&p.truth.keypoints).enumerate() {
            println!(
                "  {:>2}: predicted ({:.3}, {:.3})  true ({:.3}, {:.3})",
                k, pred.x, pred.y, truth.x, truth.y,
            );
        }
    }
    Ok(())
}

fn run_summary(args: ModelArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let summary = TrainUseCase::new(args.into()).summary()?;
    println!("{summary}");
    Ok(())
}
