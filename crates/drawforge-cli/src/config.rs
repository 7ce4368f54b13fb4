use std::path::Path;

use drawforge_checkpoint::{logistic::LogisticSpec, model::FitOptions};
use drawforge_training::population::EvolutionParams;
use serde::{Deserialize, Serialize};

use crate::util;

/// Settings shared by the commands, read from an optional JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvolutionConfig {
    pub evolution: EvolutionParams,
    /// Generations between population snapshots; `0` saves only on exit.
    pub checkpoint_every: u32,
    pub fit: FitOptions,
    pub logistic: LogisticSpec,
    pub validation_folds: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            evolution: EvolutionParams::default(),
            checkpoint_every: 10,
            fit: FitOptions::default(),
            logistic: LogisticSpec::default(),
            validation_folds: 5,
        }
    }
}

impl EvolutionConfig {
    /// Reads `path`, or returns the defaults when no file is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let config: Self = match path {
            Some(path) => util::read_json_file("config", path)?,
            None => Self::default(),
        };
        config.evolution.validate()?;
        Ok(config)
    }
}
