//! Capability traits for trainable models.
//!
//! The checkpoint manager only needs a model to save and load its parameters
//! and to expose an optional [`Optimizer`] whose state can be extracted and
//! restored as named tensors.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{
    CheckpointError,
    tensor::{DecodeError, NamedTensor, WeightSpec},
};

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum TrainingError {
    #[display("expected {expected} values per row, got {actual}")]
    Shape { expected: usize, actual: usize },
    #[display("{inputs} input rows but {targets} target rows")]
    RowCount { inputs: usize, targets: usize },
    #[display("dataset is empty")]
    EmptyDataset,
    #[display("loss became non-finite in epoch {epoch}")]
    NonFiniteLoss { epoch: usize },
    #[display("optimizer state unavailable: {reason}")]
    OptimizerState { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FitOptions {
    pub epochs: usize,
    pub batch_size: usize,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 50,
            batch_size: 32,
        }
    }
}

/// Loss and accuracy after one training epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub loss: f32,
    pub accuracy: f32,
}

pub trait Optimizer {
    /// Current optimizer state.
    fn weights(&self) -> Result<Vec<NamedTensor>, TrainingError>;

    /// Layout of [`Optimizer::weights`], when the optimizer can describe it.
    fn weight_specs(&self) -> Option<Vec<WeightSpec>>;

    /// Restores state; names and shapes must match [`Optimizer::weight_specs`].
    fn set_weights(&mut self, weights: Vec<NamedTensor>) -> Result<(), DecodeError>;

    /// Discards all accumulated state.
    fn reset(&mut self);
}

pub trait Model: Sized {
    /// File name of the manifest written by [`Model::save`].
    const MANIFEST: &'static str;

    fn predict(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, TrainingError>;

    /// Trains on `inputs`/`targets`, calling `on_epoch` after every epoch.
    fn fit(
        &mut self,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        options: &FitOptions,
        on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<Vec<EpochMetrics>, TrainingError>;

    fn optimizer(&self) -> Option<&dyn Optimizer>;

    fn optimizer_mut(&mut self) -> Option<&mut dyn Optimizer>;

    /// Writes the parameters into `dir`.
    fn save(&self, dir: &Path) -> Result<(), CheckpointError>;

    /// Reads parameters written by [`Model::save`]; the optimizer starts fresh.
    fn load(dir: &Path) -> Result<Self, CheckpointError>;
}
