use clap::{Parser, Subcommand};

use crate::logging;

use self::{
    checkpoints::CheckpointsArg, evolve::EvolveArg, predict::PredictArg,
    train_model::TrainModelArg,
};

mod checkpoints;
mod evolve;
mod predict;
mod train_model;

/// Key of the evolved population inside the checkpoint directory.
const POPULATION_KEY: &str = "population/latest.json";

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
    /// What mode to run the program in
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Evolve the player population over a draws file
    Evolve(#[clap(flatten)] EvolveArg),
    /// Train a number-probability model and checkpoint it
    TrainModel(#[clap(flatten)] TrainModelArg),
    /// Predict the next draw with the champion or a trained model
    Predict(#[clap(flatten)] PredictArg),
    /// List model checkpoints
    Checkpoints(#[clap(flatten)] CheckpointsArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    logging::init(args.verbose, args.quiet);
    match args.mode {
        Mode::Evolve(arg) => evolve::run(&arg)?,
        Mode::TrainModel(arg) => train_model::run(&arg)?,
        Mode::Predict(arg) => predict::run(&arg)?,
        Mode::Checkpoints(arg) => checkpoints::run(&arg)?,
    }
    Ok(())
}
