use std::path::PathBuf;

use anyhow::Context as _;
use chrono::Utc;
use drawforge_checkpoint::{
    CheckpointStore, ModelCheckpointManager, OptimizerSave, TrainingMetadata,
    logistic::LogisticModel,
    model::{EpochMetrics, Model as _},
    new_checkpoint_name,
};
use serde::Serialize;
use tracing::info;

use crate::{config::EvolutionConfig, dataset::Dataset, util};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainModelArg {
    /// Draws JSON file
    draws: PathBuf,
    /// Configuration JSON file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory receiving the checkpoint
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,
    /// Continue training the latest checkpoint instead of a fresh model
    #[arg(long)]
    resume: bool,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct TrainSummary {
    checkpoint: String,
    resumed_from: Option<String>,
    optimizer_saved: bool,
    metadata: TrainingMetadata,
}

pub(crate) fn run(arg: &TrainModelArg) -> anyhow::Result<()> {
    let config = EvolutionConfig::load(arg.config.as_deref())?;
    let draws = util::read_draws_file(&arg.draws)?;
    let dataset = Dataset::from_draws(&draws);
    anyhow::ensure!(
        !dataset.is_empty(),
        "At least two valid draws are needed to train a model"
    );
    let store = CheckpointStore::open(&arg.checkpoint_dir).with_context(|| {
        format!(
            "Failed to open checkpoint directory: {}",
            arg.checkpoint_dir.display()
        )
    })?;
    let manager = ModelCheckpointManager::new(store);

    let mut resumed_from = None;
    let mut model = None;
    if arg.resume
        && let Some(dir) = manager.latest_checkpoint::<LogisticModel>()?
        && let Some(loaded) = manager.load::<LogisticModel>(&dir)?
    {
        info!(checkpoint = %dir, optimizer = ?loaded.optimizer, "resuming model");
        model = Some(loaded.model);
        resumed_from = Some(dir);
    }
    let mut model = model.unwrap_or_else(|| LogisticModel::build(config.logistic));

    info!(rows = dataset.len(), draws = draws.len(), "training model");
    let epochs = model
        .fit(
            &dataset.inputs,
            &dataset.targets,
            &config.fit,
            &mut |m: &EpochMetrics| {
                if m.epoch % PROGRESS_EVERY == 0 {
                    info!(epoch = m.epoch, loss = m.loss, accuracy = m.accuracy, "training");
                }
            },
        )
        .context("Model training failed")?;
    let last = epochs
        .last()
        .context("Training ran no epochs; set fit.epochs above zero")?;

    let now = Utc::now();
    let checkpoint = new_checkpoint_name(now);
    let optimizer = manager.save(&model, &checkpoint)?;
    let metadata = TrainingMetadata {
        timestamp: now,
        accuracy: last.accuracy,
        loss: last.loss,
        epochs: epochs.len(),
        draws_count: draws.len(),
    };
    manager.save_metadata(&checkpoint, &metadata)?;
    info!(
        %checkpoint,
        loss = metadata.loss,
        accuracy = metadata.accuracy,
        "model saved"
    );

    let summary = TrainSummary {
        checkpoint,
        resumed_from,
        optimizer_saved: matches!(optimizer, OptimizerSave::Saved { .. }),
        metadata,
    };
    util::Output::save_json(&summary, arg.output.clone())?;
    Ok(())
}
