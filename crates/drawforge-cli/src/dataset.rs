//! Per-number training rows and the model-backed predictor.

use drawforge_checkpoint::{logistic::LogisticModel, model::Model as _};
use drawforge_engine::{DrawHistory, DrawRecord, NUMBER_UNIVERSE, NumberSet, Player};
use drawforge_evaluator::{
    number_feature::FeatureContext,
    predictor::{self, PredictionError, Predictor},
};

/// One row per number and draw: features from the preceding draws, target
/// `1.0` if the number was drawn.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Dataset {
    pub inputs: Vec<Vec<f32>>,
    pub targets: Vec<Vec<f32>>,
}

impl Dataset {
    /// Builds rows for every draw after the first.
    pub fn from_draws(draws: &[DrawRecord]) -> Self {
        let mut dataset = Self::default();
        let mut history = DrawHistory::new();
        for draw in draws {
            if !history.is_empty() {
                dataset.push_draw(&history, draw.numbers);
            }
            history.push(draw.clone());
        }
        dataset
    }

    fn push_draw(&mut self, history: &DrawHistory, drawn: NumberSet) {
        let context = FeatureContext::new(history);
        for n in 1..=NUMBER_UNIVERSE {
            self.inputs.push(context.features(n).to_vec());
            self.targets
                .push(vec![if drawn.contains(n) { 1.0 } else { 0.0 }]);
        }
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Feature rows of every number in the universe, in ascending order.
pub fn number_rows(history: &DrawHistory) -> Vec<Vec<f32>> {
    let context = FeatureContext::new(history);
    (1..=NUMBER_UNIVERSE)
        .map(|n| context.features(n).to_vec())
        .collect()
}

/// Predicts the numbers with the highest modelled probability.
///
/// The player is ignored apart from error reporting.
#[derive(Debug)]
pub struct ModelPredictor {
    model: LogisticModel,
}

impl ModelPredictor {
    pub fn new(model: LogisticModel) -> Self {
        Self { model }
    }

    pub fn probabilities(&self, history: &DrawHistory) -> Result<Vec<(u8, f32)>, String> {
        let outputs = self
            .model
            .predict(&number_rows(history))
            .map_err(|e| e.to_string())?;
        Ok((1..=NUMBER_UNIVERSE)
            .zip(outputs)
            .map(|(n, p)| (n, p.first().copied().unwrap_or(0.0)))
            .collect())
    }
}

impl Predictor for ModelPredictor {
    fn predict(&self, player: &Player, history: &DrawHistory) -> Result<NumberSet, PredictionError> {
        let scores = self
            .probabilities(history)
            .map_err(|e| PredictionError::new(player.id(), e))?;
        Ok(predictor::top_numbers(scores))
    }
}
