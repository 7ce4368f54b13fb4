use chrono::{DateTime, Utc};
use tracing::{Span, info, info_span, warn};

use crate::{
    CheckpointError, CheckpointStore, TrainingMetadata,
    model::{Model, TrainingError},
    tensor::{self, DecodeError},
};

pub const MODEL_DIR: &str = "model";
pub const OPTIMIZER_STATE: &str = "optimizer_state.bin";
pub const METADATA: &str = "metadata.json";

/// What happened to the optimizer state during a save.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerSave {
    Saved { bytes: usize },
    NoOptimizer,
    Failed(TrainingError),
}

/// What happened to the optimizer state during a load.
#[derive(Debug, Clone, PartialEq)]
pub enum OptimizerRestore {
    Restored,
    /// No saved state; the optimizer was reset.
    Absent,
    /// The model has no optimizer.
    NoOptimizer,
    /// The optimizer cannot describe its state layout; it was reset.
    NoWeightSpecs,
    /// The saved state did not match; the optimizer was reset.
    Failed(DecodeError),
}

#[derive(Debug)]
pub struct LoadedModel<M> {
    pub model: M,
    pub optimizer: OptimizerRestore,
}

/// Saves and restores models in checkpoint folders of a [`CheckpointStore`].
///
/// A checkpoint folder `<dir>` holds `model/` (the model's native files),
/// `optimizer_state.bin` and `metadata.json`.
#[derive(Debug, Clone)]
pub struct ModelCheckpointManager {
    store: CheckpointStore,
    span: Span,
}

impl ModelCheckpointManager {
    #[must_use]
    pub fn new(store: CheckpointStore) -> Self {
        Self {
            store,
            span: info_span!("model_checkpoints"),
        }
    }

    /// Replaces the span entered by every operation of this manager.
    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    #[must_use]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Saves the model parameters, then the optimizer state if it can be read.
    ///
    /// Failing to read the optimizer state does not fail the save; it is logged
    /// and reported in the returned [`OptimizerSave`].
    pub fn save<M>(&self, model: &M, dir: &str) -> Result<OptimizerSave, CheckpointError>
    where
        M: Model,
    {
        let _enter = self.span.enter();
        let model_dir = self.store.path_of(&format!("{dir}/{MODEL_DIR}"))?;
        model.save(&model_dir)?;

        let outcome = match model.optimizer().map(|opt| opt.weights()) {
            None => OptimizerSave::NoOptimizer,
            Some(Ok(weights)) => {
                let (bytes, _) = tensor::encode_weights(&weights);
                self.store
                    .write_binary(&format!("{dir}/{OPTIMIZER_STATE}"), &bytes)?;
                OptimizerSave::Saved { bytes: bytes.len() }
            }
            Some(Err(e)) => {
                warn!(dir, "optimizer state not saved: {e}");
                OptimizerSave::Failed(e)
            }
        };
        info!(dir, optimizer = ?outcome, "checkpoint saved");
        Ok(outcome)
    }

    /// Loads a checkpoint, or returns `None` when `dir` holds no model.
    ///
    /// Optimizer state is restored on a best-effort basis: a mismatch only
    /// resets the optimizer and is reported in [`LoadedModel::optimizer`].
    pub fn load<M>(&self, dir: &str) -> Result<Option<LoadedModel<M>>, CheckpointError>
    where
        M: Model,
    {
        let _enter = self.span.enter();
        if !self
            .store
            .exists(&format!("{dir}/{MODEL_DIR}/{}", M::MANIFEST))?
        {
            warn!(dir, "no model in checkpoint");
            return Ok(None);
        }
        let mut model = M::load(&self.store.path_of(&format!("{dir}/{MODEL_DIR}"))?)?;

        let optimizer = match model.optimizer_mut() {
            None => OptimizerRestore::NoOptimizer,
            Some(opt) => match self.store.read_binary(&format!("{dir}/{OPTIMIZER_STATE}"))? {
                None => {
                    opt.reset();
                    OptimizerRestore::Absent
                }
                Some(bytes) => match opt.weight_specs() {
                    None => {
                        opt.reset();
                        OptimizerRestore::NoWeightSpecs
                    }
                    Some(specs) => match tensor::decode_weights(&bytes, &specs)
                        .and_then(|weights| opt.set_weights(weights))
                    {
                        Ok(()) => OptimizerRestore::Restored,
                        Err(e) => {
                            warn!(dir, "optimizer state discarded: {e}");
                            opt.reset();
                            OptimizerRestore::Failed(e)
                        }
                    },
                },
            },
        };
        info!(dir, optimizer = ?optimizer, "checkpoint loaded");
        Ok(Some(LoadedModel { model, optimizer }))
    }

    pub fn save_metadata(&self, dir: &str, metadata: &TrainingMetadata) -> Result<(), CheckpointError> {
        self.store.write_json(&format!("{dir}/{METADATA}"), metadata)
    }

    pub fn load_metadata(&self, dir: &str) -> Result<Option<TrainingMetadata>, CheckpointError> {
        self.store.read_json(&format!("{dir}/{METADATA}"))
    }

    /// Checkpoint folders that contain a model of type `M`, sorted.
    pub fn list_checkpoints<M>(&self) -> Result<Vec<String>, CheckpointError>
    where
        M: Model,
    {
        let suffix = format!("/{MODEL_DIR}/{}", M::MANIFEST);
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter_map(|key| key.strip_suffix(&suffix).map(str::to_owned))
            .collect())
    }

    /// The checkpoint with the newest metadata timestamp.
    ///
    /// Checkpoints without metadata rank below those with it; among equals the
    /// greatest folder name wins.
    pub fn latest_checkpoint<M>(&self) -> Result<Option<String>, CheckpointError>
    where
        M: Model,
    {
        let mut latest: Option<(Option<DateTime<Utc>>, String)> = None;
        for dir in self.list_checkpoints::<M>()? {
            let timestamp = self.load_metadata(&dir)?.map(|m| m.timestamp);
            let candidate = (timestamp, dir);
            if latest.as_ref().is_none_or(|best| candidate > *best) {
                latest = Some(candidate);
            }
        }
        Ok(latest.map(|(_, dir)| dir))
    }
}

/// Folder name for a checkpoint created at `now`.
///
/// Names sort chronologically.
#[must_use]
pub fn new_checkpoint_name(now: DateTime<Utc>) -> String {
    now.format("checkpoint-%Y%m%d-%H%M%S-%3f").to_string()
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use chrono::TimeZone as _;

    use super::*;
    use crate::{
        logistic::{LogisticModel, LogisticSpec},
        model::{EpochMetrics, FitOptions, Optimizer},
        tensor::{NamedTensor, WeightSpec},
    };

    fn manager() -> (tempfile::TempDir, ModelCheckpointManager) {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        (dir, ModelCheckpointManager::new(store))
    }

    fn trained() -> LogisticModel {
        let mut model = LogisticModel::build(LogisticSpec {
            inputs: 2,
            outputs: 1,
            learning_rate: 0.05,
            seed: 1,
        });
        let x = vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 1.0], vec![0.0, 0.0]];
        let y = vec![vec![1.0], vec![0.0], vec![1.0], vec![0.0]];
        model
            .fit(&x, &y, &FitOptions { epochs: 5, batch_size: 2 }, &mut |_| {})
            .unwrap();
        model
    }

    #[test]
    fn test_load_missing_checkpoint() {
        let (_dir, manager) = manager();
        assert!(manager.load::<LogisticModel>("nothing").unwrap().is_none());
    }

    #[test]
    fn test_round_trip_with_optimizer() {
        let (_dir, manager) = manager();
        let model = trained();
        let saved = manager.save(&model, "run-1").unwrap();
        assert!(matches!(saved, OptimizerSave::Saved { .. }));

        let loaded = manager.load::<LogisticModel>("run-1").unwrap().unwrap();
        assert_eq!(loaded.optimizer, OptimizerRestore::Restored);
        assert_eq!(loaded.model, model);
    }

    #[test]
    fn test_absent_optimizer_state_resets() {
        let (_dir, manager) = manager();
        let model = trained();
        manager.save(&model, "run-1").unwrap();
        std::fs::remove_file(manager.store().root().join("run-1").join(OPTIMIZER_STATE)).unwrap();

        let loaded = manager.load::<LogisticModel>("run-1").unwrap().unwrap();
        assert_eq!(loaded.optimizer, OptimizerRestore::Absent);
        assert_eq!(loaded.model.adam().iterations(), 0);
        let x = [vec![0.3, 0.7]];
        assert_eq!(loaded.model.predict(&x).unwrap(), model.predict(&x).unwrap());
    }

    #[test]
    fn test_mismatched_optimizer_state_is_reported() {
        let (_dir, manager) = manager();
        manager.save(&trained(), "run-1").unwrap();
        manager
            .store()
            .write_binary(&format!("run-1/{OPTIMIZER_STATE}"), &[0; 6])
            .unwrap();

        let loaded = manager.load::<LogisticModel>("run-1").unwrap().unwrap();
        assert!(matches!(
            loaded.optimizer,
            OptimizerRestore::Failed(DecodeError::ByteLength { actual: 6, .. })
        ));
        assert_eq!(loaded.model.adam().iterations(), 0);
    }

    struct Opaque {
        inner: LogisticModel,
    }

    struct Unreadable;

    impl Optimizer for Unreadable {
        fn weights(&self) -> Result<Vec<NamedTensor>, TrainingError> {
            Err(TrainingError::OptimizerState {
                reason: "not materialized".to_owned(),
            })
        }

        fn weight_specs(&self) -> Option<Vec<WeightSpec>> {
            None
        }

        fn set_weights(&mut self, _weights: Vec<NamedTensor>) -> Result<(), DecodeError> {
            Ok(())
        }

        fn reset(&mut self) {}
    }

    static UNREADABLE: Unreadable = Unreadable;

    impl Model for Opaque {
        const MANIFEST: &'static str = "model.json";

        fn predict(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, TrainingError> {
            self.inner.predict(inputs)
        }

        fn fit(
            &mut self,
            inputs: &[Vec<f32>],
            targets: &[Vec<f32>],
            options: &FitOptions,
            on_epoch: &mut dyn FnMut(&EpochMetrics),
        ) -> Result<Vec<EpochMetrics>, TrainingError> {
            self.inner.fit(inputs, targets, options, on_epoch)
        }

        fn optimizer(&self) -> Option<&dyn Optimizer> {
            Some(&UNREADABLE)
        }

        fn optimizer_mut(&mut self) -> Option<&mut dyn Optimizer> {
            None
        }

        fn save(&self, dir: &Path) -> Result<(), CheckpointError> {
            self.inner.save(dir)
        }

        fn load(dir: &Path) -> Result<Self, CheckpointError> {
            Ok(Self {
                inner: LogisticModel::load(dir)?,
            })
        }
    }

    #[test]
    fn test_unreadable_optimizer_still_saves_model() {
        let (_dir, manager) = manager();
        let model = Opaque { inner: trained() };
        let saved = manager.save(&model, "run-1").unwrap();
        assert!(matches!(saved, OptimizerSave::Failed(_)));
        assert!(!manager.store().exists(&format!("run-1/{OPTIMIZER_STATE}")).unwrap());

        let loaded = manager.load::<Opaque>("run-1").unwrap().unwrap();
        assert_eq!(loaded.optimizer, OptimizerRestore::NoOptimizer);
        let x = [vec![1.0, 0.5]];
        assert_eq!(
            loaded.model.predict(&x).unwrap(),
            model.predict(&x).unwrap()
        );
    }

    #[test]
    fn test_metadata_and_latest() {
        let (_dir, manager) = manager();
        let model = trained();
        for dir in ["a", "b", "c"] {
            manager.save(&model, dir).unwrap();
        }
        let metadata = |hour| TrainingMetadata {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap(),
            accuracy: 0.5,
            loss: 0.7,
            epochs: 5,
            draws_count: 4,
        };
        manager.save_metadata("a", &metadata(12)).unwrap();
        manager.save_metadata("b", &metadata(9)).unwrap();

        assert_eq!(manager.load_metadata("a").unwrap(), Some(metadata(12)));
        assert_eq!(manager.load_metadata("c").unwrap(), None);
        assert_eq!(
            manager.list_checkpoints::<LogisticModel>().unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(
            manager.latest_checkpoint::<LogisticModel>().unwrap(),
            Some("a".to_owned())
        );
    }

    #[test]
    fn test_checkpoint_names_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let late = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();
        assert_eq!(new_checkpoint_name(early), "checkpoint-20240309-235959-000");
        assert!(new_checkpoint_name(early) < new_checkpoint_name(late));
    }
}
