use std::{path::PathBuf, thread, time::Duration};

use anyhow::Context as _;
use drawforge_checkpoint::{CheckpointError, CheckpointStore};
use drawforge_engine::{EvolutionSeed, Player};
use drawforge_evaluator::{fitness::FitnessEvaluator, predictor::WeightedNumberPredictor};
use drawforge_training::population::{
    GenerationReport, PopulationManager, PopulationSnapshot, StopSignal,
};
use rand::Rng as _;
use serde::Serialize;
use tracing::{info, info_span, warn};

use crate::{command::POPULATION_KEY, config::EvolutionConfig, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct EvolveArg {
    /// Draws JSON file
    draws: PathBuf,
    /// Configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory holding the population snapshot
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,
    /// Seed of a fresh population, as 32 hex digits or a decimal integer;
    /// random when omitted
    #[arg(long)]
    seed: Option<EvolutionSeed>,
    /// Stop after this many generations
    #[arg(long)]
    max_generations: Option<usize>,
    /// Stop after this many seconds, once the running generation completes
    #[arg(long)]
    time_limit_secs: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EvolveSummary {
    /// Seed of a fresh run; absent when resumed.
    seed: Option<EvolutionSeed>,
    resumed_at: Option<u32>,
    generations: usize,
    stopped: bool,
    next_generation: u32,
    last_report: Option<GenerationReport>,
    champion: Option<Player>,
}

pub(crate) fn run(arg: &EvolveArg) -> anyhow::Result<()> {
    let config = EvolutionConfig::load(arg.config.as_deref())?;
    let draws = util::read_draws_file(&arg.draws)?;
    let store = CheckpointStore::open(&arg.checkpoint_dir).with_context(|| {
        format!(
            "Failed to open checkpoint directory: {}",
            arg.checkpoint_dir.display()
        )
    })?;

    let (mut manager, seed, resumed_at) =
        match store.read_json::<PopulationSnapshot>(POPULATION_KEY)? {
            Some(snapshot) => {
                let generation = snapshot.generation;
                let manager = PopulationManager::from_snapshot(config.evolution, snapshot)
                    .context("Stored population does not match the configuration")?;
                info!(generation, "resuming population");
                (manager, None, Some(generation))
            }
            None => {
                let seed = arg.seed.unwrap_or_else(|| rand::rng().random());
                info!(%seed, "starting new population");
                (PopulationManager::new(config.evolution, seed)?, Some(seed), None)
            }
        };
    manager = manager.with_span(info_span!("evolve", dir = %arg.checkpoint_dir.display()));

    let last_seen = manager.history().last().map(|d| d.draw_index);
    let pending = draws
        .into_iter()
        .filter(|d| last_seen.is_none_or(|last| d.draw_index > last))
        .take(arg.max_generations.unwrap_or(usize::MAX));

    let stop = StopSignal::new();
    if let Some(secs) = arg.time_limit_secs {
        let stop = stop.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_secs(secs));
            stop.raise();
        });
    }

    let mut last_report = None;
    let mut save_error: Option<CheckpointError> = None;
    let outcome = manager.run(
        pending,
        &WeightedNumberPredictor,
        &FitnessEvaluator::new(),
        &stop,
        |manager, report| {
            info!(
                generation = report.generation,
                champion = %report.champion.id,
                fitness = report.champion.fitness,
                prediction = %report.champion.prediction,
                niche = report.dominant_niche.as_str(),
                "generation complete"
            );
            let every = config.checkpoint_every;
            if every > 0
                && report.generation % every == 0
                && let Err(e) = store.write_json(POPULATION_KEY, &manager.snapshot())
            {
                warn!("population snapshot failed, stopping: {e}");
                save_error.get_or_insert(e);
                stop.raise();
            }
            last_report = Some(report.clone());
        },
    );
    // a failed tick leaves the population untouched
    store
        .write_json(POPULATION_KEY, &manager.snapshot())
        .context("Failed to save population snapshot")?;
    let outcome = outcome?;
    if let Some(e) = save_error {
        return Err(e).context("Failed to save population snapshot");
    }

    info!(
        ticks = outcome.ticks,
        stopped = outcome.stopped,
        "evolution finished"
    );
    let summary = EvolveSummary {
        seed,
        resumed_at,
        generations: outcome.ticks,
        stopped: outcome.stopped,
        next_generation: manager.generation(),
        last_report,
        champion: manager.champion().cloned(),
    };
    util::Output::save_json(&summary, arg.output.clone())?;
    Ok(())
}
