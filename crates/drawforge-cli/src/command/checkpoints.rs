use std::path::PathBuf;

use anyhow::Context as _;
use drawforge_checkpoint::{
    CheckpointStore, ModelCheckpointManager, TrainingMetadata, logistic::LogisticModel,
};
use drawforge_training::population::PopulationSnapshot;
use serde::Serialize;

use crate::{command::POPULATION_KEY, util};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct CheckpointsArg {
    /// Directory holding the checkpoints
    #[arg(long, default_value = "checkpoints")]
    checkpoint_dir: PathBuf,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckpointList {
    /// Generation the stored population evaluates next.
    population_generation: Option<u32>,
    checkpoints: Vec<CheckpointEntry>,
}

#[derive(Debug, Serialize)]
struct CheckpointEntry {
    name: String,
    latest: bool,
    metadata: Option<TrainingMetadata>,
}

pub(crate) fn run(arg: &CheckpointsArg) -> anyhow::Result<()> {
    let store = CheckpointStore::open(&arg.checkpoint_dir).with_context(|| {
        format!(
            "Failed to open checkpoint directory: {}",
            arg.checkpoint_dir.display()
        )
    })?;
    let population_generation = store
        .read_json::<PopulationSnapshot>(POPULATION_KEY)?
        .map(|s| s.generation);

    let manager = ModelCheckpointManager::new(store);
    let latest = manager.latest_checkpoint::<LogisticModel>()?;
    let checkpoints = manager
        .list_checkpoints::<LogisticModel>()?
        .into_iter()
        .map(|name| {
            Ok::<_, anyhow::Error>(CheckpointEntry {
                latest: latest.as_ref() == Some(&name),
                metadata: manager.load_metadata(&name)?,
                name,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let list = CheckpointList {
        population_generation,
        checkpoints,
    };
    util::Output::save_json(&list, arg.output.clone())?;
    Ok(())
}
