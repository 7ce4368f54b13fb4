//! A single dense sigmoid layer trained with Adam on binary cross-entropy.
//!
//! # Native Format
//!
//! ```text
//! <dir>/model.json    manifest: format tag, LogisticSpec, weight specs
//! <dir>/weights.bin   kernel [inputs × outputs] then bias [outputs], LE f32
//! ```
//!
//! # Optimizer State
//!
//! | name       | shape               |
//! |------------|---------------------|
//! | `iter`     | scalar              |
//! | `kernel/m` | `[inputs, outputs]` |
//! | `kernel/v` | `[inputs, outputs]` |
//! | `bias/m`   | `[outputs]`         |
//! | `bias/v`   | `[outputs]`         |

use std::path::Path;

use rand::{Rng as _, SeedableRng as _};
use rand_distr::Normal;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    CheckpointError, CheckpointStore,
    model::{EpochMetrics, FitOptions, Model, Optimizer, TrainingError},
    tensor::{self, DecodeError, NamedTensor, Tensor, WeightSpec},
};

const FORMAT: &str = "drawforge-logistic/1";
const WEIGHTS_FILE: &str = "weights.bin";
const PROBABILITY_EPSILON: f32 = 1e-7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogisticSpec {
    pub inputs: usize,
    pub outputs: usize,
    pub learning_rate: f32,
    /// Seed of the initial kernel.
    pub seed: u64,
}

impl Default for LogisticSpec {
    fn default() -> Self {
        Self {
            inputs: 17,
            outputs: 1,
            learning_rate: 0.001,
            seed: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format: String,
    spec: LogisticSpec,
    weights_file: String,
    weights: Vec<WeightSpec>,
}

/// Adam optimizer for one dense layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    epsilon: f32,
    inputs: usize,
    outputs: usize,
    iter: u32,
    kernel_m: Vec<f32>,
    kernel_v: Vec<f32>,
    bias_m: Vec<f32>,
    bias_v: Vec<f32>,
}

impl Adam {
    fn new(learning_rate: f32, inputs: usize, outputs: usize) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
            inputs,
            outputs,
            iter: 0,
            kernel_m: vec![0.0; inputs * outputs],
            kernel_v: vec![0.0; inputs * outputs],
            bias_m: vec![0.0; outputs],
            bias_v: vec![0.0; outputs],
        }
    }

    #[must_use]
    pub fn iterations(&self) -> u32 {
        self.iter
    }

    fn step(&mut self, kernel: &mut [f32], bias: &mut [f32], grad_kernel: &[f32], grad_bias: &[f32]) {
        self.iter += 1;
        #[expect(clippy::cast_possible_wrap)]
        let t = self.iter as i32;
        let step_size =
            self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt() / (1.0 - self.beta1.powi(t));
        let (beta1, beta2, epsilon) = (self.beta1, self.beta2, self.epsilon);
        let update = |params: &mut [f32], grads: &[f32], m: &mut [f32], v: &mut [f32]| {
            for (((p, g), m), v) in params.iter_mut().zip(grads).zip(m).zip(v) {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= step_size * *m / (v.sqrt() + epsilon);
            }
        };
        update(kernel, grad_kernel, &mut self.kernel_m, &mut self.kernel_v);
        update(bias, grad_bias, &mut self.bias_m, &mut self.bias_v);
    }
}

impl Optimizer for Adam {
    #[expect(clippy::cast_precision_loss)]
    fn weights(&self) -> Result<Vec<NamedTensor>, TrainingError> {
        let dense = |shape: Vec<usize>, data: &[f32]| {
            Tensor::new(shape, data.to_vec()).map_err(|e| TrainingError::OptimizerState {
                reason: e.to_string(),
            })
        };
        let kernel_shape = vec![self.inputs, self.outputs];
        Ok(vec![
            NamedTensor::new("iter", Tensor::scalar(self.iter as f32)),
            NamedTensor::new("kernel/m", dense(kernel_shape.clone(), &self.kernel_m)?),
            NamedTensor::new("kernel/v", dense(kernel_shape, &self.kernel_v)?),
            NamedTensor::new("bias/m", dense(vec![self.outputs], &self.bias_m)?),
            NamedTensor::new("bias/v", dense(vec![self.outputs], &self.bias_v)?),
        ])
    }

    fn weight_specs(&self) -> Option<Vec<WeightSpec>> {
        let kernel_shape = vec![self.inputs, self.outputs];
        Some(vec![
            WeightSpec::new("iter", vec![]),
            WeightSpec::new("kernel/m", kernel_shape.clone()),
            WeightSpec::new("kernel/v", kernel_shape),
            WeightSpec::new("bias/m", vec![self.outputs]),
            WeightSpec::new("bias/v", vec![self.outputs]),
        ])
    }

    #[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_weights(&mut self, weights: Vec<NamedTensor>) -> Result<(), DecodeError> {
        let specs = self.weight_specs().unwrap_or_default();
        tensor::check_specs(&weights, &specs)?;
        let mut data = weights.into_iter().map(|w| w.tensor.into_data());
        let mut next = || data.next().unwrap_or_default();
        self.iter = next().first().copied().unwrap_or(0.0).max(0.0) as u32;
        self.kernel_m = next();
        self.kernel_v = next();
        self.bias_m = next();
        self.bias_v = next();
        Ok(())
    }

    fn reset(&mut self) {
        *self = Self::new(self.learning_rate, self.inputs, self.outputs);
    }
}

/// Dense sigmoid layer: `p = σ(x · kernel + bias)`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticModel {
    spec: LogisticSpec,
    kernel: Vec<f32>,
    bias: Vec<f32>,
    optimizer: Adam,
}

impl LogisticModel {
    /// Builds a model with Glorot-normal kernel and zero bias.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn build(spec: LogisticSpec) -> Self {
        let fan = (spec.inputs + spec.outputs).max(1) as f32;
        let normal = Normal::new(0.0, (2.0 / fan).sqrt()).expect("standard deviation is finite");
        let mut rng = Pcg32::seed_from_u64(spec.seed);
        let kernel = (0..spec.inputs * spec.outputs)
            .map(|_| rng.sample(normal))
            .collect();
        Self {
            spec,
            kernel,
            bias: vec![0.0; spec.outputs],
            optimizer: Adam::new(spec.learning_rate, spec.inputs, spec.outputs),
        }
    }

    #[must_use]
    pub fn spec(&self) -> &LogisticSpec {
        &self.spec
    }

    #[must_use]
    pub fn adam(&self) -> &Adam {
        &self.optimizer
    }

    fn forward(&self, row: &[f32]) -> Vec<f32> {
        (0..self.spec.outputs)
            .map(|j| {
                let z = row
                    .iter()
                    .enumerate()
                    .fold(self.bias[j], |acc, (i, x)| acc + x * self.kernel[i * self.spec.outputs + j]);
                sigmoid(z)
            })
            .collect()
    }

    #[expect(clippy::cast_precision_loss)]
    fn gradients(&self, inputs: &[Vec<f32>], targets: &[Vec<f32>]) -> (Vec<f32>, Vec<f32>) {
        let outputs = self.spec.outputs;
        let scale = (inputs.len() * outputs) as f32;
        let mut grad_kernel = vec![0.0; self.kernel.len()];
        let mut grad_bias = vec![0.0; outputs];
        for (x, y) in inputs.iter().zip(targets) {
            let p = self.forward(x);
            for j in 0..outputs {
                let dz = (p[j] - y[j]) / scale;
                grad_bias[j] += dz;
                for (i, xi) in x.iter().enumerate() {
                    grad_kernel[i * outputs + j] += xi * dz;
                }
            }
        }
        (grad_kernel, grad_bias)
    }

    #[expect(clippy::cast_precision_loss)]
    fn metrics(&self, inputs: &[Vec<f32>], targets: &[Vec<f32>], epoch: usize) -> EpochMetrics {
        let mut loss = 0.0;
        let mut correct = 0_usize;
        let mut count = 0_usize;
        for (x, y) in inputs.iter().zip(targets) {
            for (p, t) in self.forward(x).into_iter().zip(y) {
                let p = p.clamp(PROBABILITY_EPSILON, 1.0 - PROBABILITY_EPSILON);
                loss -= t * p.ln() + (1.0 - t) * (1.0 - p).ln();
                if (p >= 0.5) == (*t >= 0.5) {
                    correct += 1;
                }
                count += 1;
            }
        }
        let count = count.max(1) as f32;
        EpochMetrics {
            epoch,
            loss: loss / count,
            accuracy: correct as f32 / count,
        }
    }

    fn parameters(&self) -> Vec<NamedTensor> {
        vec![
            NamedTensor::new(
                "kernel",
                Tensor::new(vec![self.spec.inputs, self.spec.outputs], self.kernel.clone())
                    .expect("kernel matches spec"),
            ),
            NamedTensor::new(
                "bias",
                Tensor::new(vec![self.spec.outputs], self.bias.clone()).expect("bias matches spec"),
            ),
        ]
    }
}

fn check_rows(rows: &[Vec<f32>], width: usize) -> Result<(), TrainingError> {
    match rows.iter().find(|r| r.len() != width) {
        Some(row) => Err(TrainingError::Shape {
            expected: width,
            actual: row.len(),
        }),
        None => Ok(()),
    }
}

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

impl Model for LogisticModel {
    const MANIFEST: &'static str = "model.json";

    fn predict(&self, inputs: &[Vec<f32>]) -> Result<Vec<Vec<f32>>, TrainingError> {
        check_rows(inputs, self.spec.inputs)?;
        Ok(inputs.iter().map(|row| self.forward(row)).collect())
    }

    fn fit(
        &mut self,
        inputs: &[Vec<f32>],
        targets: &[Vec<f32>],
        options: &FitOptions,
        on_epoch: &mut dyn FnMut(&EpochMetrics),
    ) -> Result<Vec<EpochMetrics>, TrainingError> {
        if inputs.is_empty() {
            return Err(TrainingError::EmptyDataset);
        }
        if inputs.len() != targets.len() {
            return Err(TrainingError::RowCount {
                inputs: inputs.len(),
                targets: targets.len(),
            });
        }
        check_rows(inputs, self.spec.inputs)?;
        check_rows(targets, self.spec.outputs)?;

        let batch_size = options.batch_size.max(1);
        let mut history = Vec::with_capacity(options.epochs);
        for epoch in 1..=options.epochs {
            for (x, y) in inputs.chunks(batch_size).zip(targets.chunks(batch_size)) {
                let (grad_kernel, grad_bias) = self.gradients(x, y);
                self.optimizer
                    .step(&mut self.kernel, &mut self.bias, &grad_kernel, &grad_bias);
            }
            let metrics = self.metrics(inputs, targets, epoch);
            if !metrics.loss.is_finite() {
                return Err(TrainingError::NonFiniteLoss { epoch });
            }
            debug!(epoch, loss = metrics.loss, accuracy = metrics.accuracy, "epoch finished");
            on_epoch(&metrics);
            history.push(metrics);
        }
        Ok(history)
    }

    fn optimizer(&self) -> Option<&dyn Optimizer> {
        Some(&self.optimizer)
    }

    fn optimizer_mut(&mut self) -> Option<&mut dyn Optimizer> {
        Some(&mut self.optimizer)
    }

    fn save(&self, dir: &Path) -> Result<(), CheckpointError> {
        let store = CheckpointStore::open(dir)?;
        let (bytes, weights) = tensor::encode_weights(&self.parameters());
        store.write_binary(WEIGHTS_FILE, &bytes)?;
        store.write_json(
            Self::MANIFEST,
            &Manifest {
                format: FORMAT.to_owned(),
                spec: self.spec,
                weights_file: WEIGHTS_FILE.to_owned(),
                weights,
            },
        )
    }

    fn load(dir: &Path) -> Result<Self, CheckpointError> {
        let store = CheckpointStore::open(dir)?;
        let manifest_error = |reason: &str| CheckpointError::Manifest {
            path: dir.join(Self::MANIFEST),
            reason: reason.to_owned(),
        };
        let manifest: Manifest = store
            .read_json(Self::MANIFEST)?
            .ok_or_else(|| manifest_error("missing"))?;
        if manifest.format != FORMAT {
            return Err(manifest_error(&format!("unknown format {:?}", manifest.format)));
        }
        let bytes = store
            .read_binary(&manifest.weights_file)?
            .ok_or_else(|| manifest_error("weights file missing"))?;

        let mut model = Self::build(manifest.spec);
        let tensors = tensor::decode_weights(&bytes, &manifest.weights)?;
        let expected = model
            .parameters()
            .iter()
            .map(NamedTensor::spec)
            .collect::<Vec<_>>();
        tensor::check_specs(&tensors, &expected)?;
        let mut tensors = tensors.into_iter().map(|t| t.tensor.into_data());
        model.kernel = tensors.next().unwrap_or_default();
        model.bias = tensors.next().unwrap_or_default();
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f32>>, Vec<Vec<f32>>) {
        (0..40_u8)
            .map(|i| {
                let x = f32::from(i) / 40.0;
                (vec![x], vec![if x > 0.5 { 1.0 } else { 0.0 }])
            })
            .unzip()
    }

    fn small() -> LogisticModel {
        LogisticModel::build(LogisticSpec {
            inputs: 1,
            outputs: 1,
            learning_rate: 0.1,
            seed: 7,
        })
    }

    #[test]
    fn test_fit_reduces_loss() {
        let (x, y) = dataset();
        let mut model = small();
        let mut calls = 0;
        let history = model
            .fit(
                &x,
                &y,
                &FitOptions {
                    epochs: 100,
                    batch_size: 8,
                },
                &mut |_| calls += 1,
            )
            .unwrap();
        assert_eq!(history.len(), 100);
        assert_eq!(calls, 100);
        assert!(history[99].loss < history[0].loss);
        assert!(history[99].accuracy >= 0.75);
        assert_eq!(model.adam().iterations(), 500);
    }

    #[test]
    fn test_fit_rejects_bad_data() {
        let mut model = small();
        let options = FitOptions::default();
        assert_eq!(
            model.fit(&[], &[], &options, &mut |_| {}).unwrap_err(),
            TrainingError::EmptyDataset
        );
        assert!(matches!(
            model.fit(&[vec![1.0, 2.0]], &[vec![1.0]], &options, &mut |_| {}),
            Err(TrainingError::Shape { .. })
        ));
        assert!(matches!(
            model.fit(&[vec![1.0]], &[], &options, &mut |_| {}),
            Err(TrainingError::RowCount { .. })
        ));
    }

    #[test]
    fn test_predictions_are_probabilities() {
        let model = LogisticModel::build(LogisticSpec::default());
        let out = model.predict(&[vec![1.0; 17], vec![0.0; 17]]).unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().flatten().all(|p| (0.0..=1.0).contains(p)));
        assert_eq!(out[1], vec![0.5]);
    }

    #[test]
    fn test_save_load_preserves_parameters() {
        let dir = tempfile::tempdir().unwrap();
        let (x, y) = dataset();
        let mut model = small();
        model
            .fit(&x, &y, &FitOptions::default(), &mut |_| {})
            .unwrap();
        model.save(dir.path()).unwrap();

        let loaded = LogisticModel::load(dir.path()).unwrap();
        assert_eq!(loaded.predict(&x).unwrap(), model.predict(&x).unwrap());
        assert_eq!(loaded.adam().iterations(), 0);
    }

    #[test]
    fn test_load_rejects_foreign_manifest() {
        let dir = tempfile::tempdir().unwrap();
        small().save(dir.path()).unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        let mut manifest: serde_json::Value = store.read_json("model.json").unwrap().unwrap();
        manifest["format"] = "other/1".into();
        store.write_json("model.json", &manifest).unwrap();
        assert!(matches!(
            LogisticModel::load(dir.path()),
            Err(CheckpointError::Manifest { .. })
        ));
    }

    #[test]
    fn test_optimizer_state_round_trip() {
        let (x, y) = dataset();
        let mut trained = small();
        trained
            .fit(&x, &y, &FitOptions::default(), &mut |_| {})
            .unwrap();
        let state = trained.adam().weights().unwrap();

        let mut fresh = small();
        fresh.optimizer_mut().unwrap().set_weights(state).unwrap();
        assert_eq!(fresh.adam(), trained.adam());

        fresh.optimizer_mut().unwrap().reset();
        assert_eq!(fresh.adam(), small().adam());
    }

    #[test]
    fn test_optimizer_rejects_mismatched_state() {
        let other = LogisticModel::build(LogisticSpec::default());
        let state = other.adam().weights().unwrap();
        let mut model = small();
        assert!(matches!(
            model.optimizer_mut().unwrap().set_weights(state),
            Err(DecodeError::Shape { .. })
        ));
    }
}
