use std::path::PathBuf;

use anyhow::Context as _;
use drawforge_checkpoint::{CheckpointStore, ModelCheckpointManager, logistic::LogisticModel};
use drawforge_engine::{DrawHistory, DrawRecord, Niche, NumberSet, Player, PlayerId, Weights};
use drawforge_evaluator::{
    predictor::{Predictor, WeightedNumberPredictor},
    validation::{self, ValidationMetrics},
};
use drawforge_training::population::{PopulationManager, PopulationSnapshot};
use serde::Serialize;
use tracing::info;

use crate::{command::POPULATION_KEY, config::EvolutionConfig, dataset::ModelPredictor, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArg {
    /// Draws JSON file; the prediction is for the draw after the last one
    draws: PathBuf,
    /// Configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the population snapshot and model checkpoints
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,
    /// Predict with a trained model instead of the evolved champion
    #[arg(long)]
    model: bool,
    /// Model checkpoint to use; the latest when omitted
    #[arg(long, requires = "model")]
    checkpoint: Option<String>,
    /// Back-test over the draws file with this many folds (0 disables)
    #[arg(long)]
    folds: Option<usize>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct PredictSummary {
    source: String,
    after_draw: Option<u32>,
    prediction: NumberSet,
    validation: Option<Validation>,
}

#[derive(Debug, Serialize)]
struct Validation {
    draws: usize,
    overall: ValidationMetrics,
    folds: Vec<ValidationMetrics>,
}

pub(crate) fn run(arg: &PredictArg) -> anyhow::Result<()> {
    let config = EvolutionConfig::load(arg.config.as_deref())?;
    let draws = util::read_draws_file(&arg.draws)?;
    let store = CheckpointStore::open(&arg.checkpoint_dir).with_context(|| {
        format!(
            "Failed to open checkpoint directory: {}",
            arg.checkpoint_dir.display()
        )
    })?;

    let (source, player, predictor): (String, Player, Box<dyn Predictor>) = if arg.model {
        let manager = ModelCheckpointManager::new(store);
        let dir = match &arg.checkpoint {
            Some(dir) => dir.clone(),
            None => manager
                .latest_checkpoint::<LogisticModel>()?
                .context("No model checkpoint found; run `train-model` first")?,
        };
        let loaded = manager
            .load::<LogisticModel>(&dir)?
            .with_context(|| format!("Checkpoint {dir} holds no model"))?;
        let player = Player::new(PlayerId(0), Weights::from_fn(|_| 0.0), Niche::General, 0);
        (
            format!("model {dir}"),
            player,
            Box::new(ModelPredictor::new(loaded.model)) as Box<dyn Predictor>,
        )
    } else {
        let snapshot = store
            .read_json::<PopulationSnapshot>(POPULATION_KEY)?
            .context("No evolved population found; run `evolve` first")?;
        let manager = PopulationManager::from_snapshot(config.evolution, snapshot)
            .context("Stored population does not match the configuration")?;
        let champion = manager
            .champion()
            .cloned()
            .context("Stored population is empty")?;
        (
            format!("champion {}", champion.id()),
            champion,
            Box::new(WeightedNumberPredictor) as Box<dyn Predictor>,
        )
    };

    let history = draws.iter().cloned().collect::<DrawHistory>();
    let prediction = predictor.predict(&player, &history)?;
    info!(%source, %prediction, "next draw predicted");

    let folds = arg.folds.unwrap_or(config.validation_folds);
    let validation = if folds > 0 {
        Some(back_test(&draws, &player, predictor.as_ref(), folds)?)
    } else {
        None
    };

    let summary = PredictSummary {
        source,
        after_draw: history.last().map(|d| d.draw_index),
        prediction,
        validation,
    };
    util::Output::save_json(&summary, arg.output.clone())?;
    Ok(())
}

/// Predicts every draw after the first from the draws before it.
fn back_test<P>(
    draws: &[DrawRecord],
    player: &Player,
    predictor: &P,
    folds: usize,
) -> anyhow::Result<Validation>
where
    P: Predictor + ?Sized,
{
    let mut history = DrawHistory::new();
    let mut predictions = vec![];
    let mut actual = vec![];
    for draw in draws {
        if !history.is_empty() {
            predictions.push(predictor.predict(player, &history)?);
            actual.push(draw.numbers);
        }
        history.push(draw.clone());
    }
    let validation = Validation {
        draws: actual.len(),
        overall: validation::metrics(&predictions, &actual),
        folds: validation::cross_validate(&predictions, &actual, folds),
    };
    info!(
        draws = validation.draws,
        f1 = validation.overall.f1_score,
        "back-test complete"
    );
    Ok(validation)
}
