//! Turning a player's weights into a predicted draw.

use drawforge_engine::{DRAW_SIZE, DrawHistory, NUMBER_UNIVERSE, NumberSet, Player, PlayerId};

use crate::number_feature::FeatureContext;

#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("prediction failed for player {player}: {message}")]
pub struct PredictionError {
    pub player: PlayerId,
    #[error(not(source))]
    pub message: String,
}

impl PredictionError {
    pub fn new(player: PlayerId, message: impl Into<String>) -> Self {
        Self {
            player,
            message: message.into(),
        }
    }
}

/// Produces a prediction for a player.
///
/// Implementations are shared across the worker threads of a generation tick.
pub trait Predictor: Send + Sync {
    /// Predicts the next draw for `player` given all draws revealed so far.
    fn predict(&self, player: &Player, history: &DrawHistory) -> Result<NumberSet, PredictionError>;
}

impl<P> Predictor for &P
where
    P: Predictor + ?Sized,
{
    fn predict(&self, player: &Player, history: &DrawHistory) -> Result<NumberSet, PredictionError> {
        (**self).predict(player, history)
    }
}

/// Scores every number by `Σ wᵢ·fᵢ` and picks the top [`DRAW_SIZE`].
///
/// Ties are broken in favour of the lower number, so the prediction is a pure
/// function of weights and history.
#[derive(Debug, Default, Clone, Copy)]
pub struct WeightedNumberPredictor;

impl WeightedNumberPredictor {
    /// Score of every number in the universe, in ascending number order.
    #[must_use]
    pub fn scores(&self, player: &Player, history: &DrawHistory) -> Vec<(u8, f32)> {
        let context = FeatureContext::new(history);
        let weights = player.weights().as_slice();
        (1..=NUMBER_UNIVERSE)
            .map(|n| {
                let score: f32 = context
                    .features(n)
                    .iter()
                    .zip(weights)
                    .map(|(f, w)| f * w)
                    .sum();
                (n, score)
            })
            .collect()
    }
}

impl Predictor for WeightedNumberPredictor {
    fn predict(&self, player: &Player, history: &DrawHistory) -> Result<NumberSet, PredictionError> {
        Ok(top_numbers(self.scores(player, history)))
    }
}

/// The [`DRAW_SIZE`] highest-scoring numbers.
///
/// `scores` must be in ascending number order; equal scores favour the lower
/// number.
#[must_use]
pub fn top_numbers(mut scores: Vec<(u8, f32)>) -> NumberSet {
    scores.sort_by(|a, b| b.1.total_cmp(&a.1));
    NumberSet::from_numbers(scores.into_iter().take(DRAW_SIZE).map(|(n, _)| n))
}
