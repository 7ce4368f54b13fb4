//! Fitness scoring of a player's prediction history.
//!
//! # Formula
//!
//! ```text
//! fitness = matches × 2 + consistency × 0.3 + adaptability × 0.2 + niche × 1.5
//!
//! where:
//!   matches      = Σ over all past predictions of |prediction ∩ draw|
//!   consistency  = (adjacent prediction pairs sharing ≥ 10 numbers) / max(1, n - 1) × 5
//!                  (0 when fewer than 2 predictions)
//!   adaptability = min(distinct numbers in the last 5 predictions / (0.6 × 25) × 5, 5)
//!                  (0 when fewer than 5 predictions)
//!   niche        = niche bonus of the player's niche on the draw (see `niche` module)
//! ```
//!
//! `matches` counts overlap of every past prediction with the current draw, not
//! only the latest one.

use drawforge_engine::{NUMBER_UNIVERSE, NumberSet, Player};
use tracing::warn;

use crate::niche::NicheClassifier;

pub const MATCH_WEIGHT: f32 = 2.0;
pub const CONSISTENCY_WEIGHT: f32 = 0.3;
pub const ADAPTABILITY_WEIGHT: f32 = 0.2;
pub const NICHE_WEIGHT: f32 = 1.5;

/// Minimum overlap for two adjacent predictions to count as consistent.
pub const CONSISTENT_OVERLAP: usize = 10;
/// Number of recent predictions the adaptability score looks at.
pub const ADAPTABILITY_WINDOW: usize = 5;

const SUB_SCORE_SCALE: f32 = 5.0;
const ADAPTABILITY_TARGET: f32 = NUMBER_UNIVERSE as f32 * 0.6;

/// Individual terms of a fitness score, before weighting.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct FitnessBreakdown {
    pub matches: usize,
    pub consistency: f32,
    pub adaptability: f32,
    pub niche: f32,
}

impl FitnessBreakdown {
    /// Weighted sum of the terms.
    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn total(&self) -> f32 {
        self.matches as f32 * MATCH_WEIGHT
            + self.consistency * CONSISTENCY_WEIGHT
            + self.adaptability * ADAPTABILITY_WEIGHT
            + self.niche * NICHE_WEIGHT
    }
}

/// Scores players against a revealed draw.
#[derive(Debug, Default, Clone, Copy)]
pub struct FitnessEvaluator {
    niches: NicheClassifier,
}

impl FitnessEvaluator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fitness of `player` for `draw`.
    #[must_use]
    pub fn evaluate(&self, player: &Player, draw: NumberSet) -> f32 {
        self.breakdown(player, draw).total()
    }

    /// Fitness for a draw that has not been validated yet.
    ///
    /// Returns `0.0` and logs the reason when `raw_draw` is not a well-formed
    /// number set.
    #[must_use]
    pub fn evaluate_raw(&self, player: &Player, raw_draw: &[i64]) -> f32 {
        match NumberSet::new(raw_draw.iter().copied()) {
            Ok(draw) => self.evaluate(player, draw),
            Err(e) => {
                warn!(player = %player.id(), "scoring player as 0: malformed draw: {e}");
                0.0
            }
        }
    }

    /// Computes each fitness term separately.
    #[must_use]
    pub fn breakdown(&self, player: &Player, draw: NumberSet) -> FitnessBreakdown {
        let predictions = player.predictions();
        FitnessBreakdown {
            matches: predictions.iter().map(|p| p.intersection_len(draw)).sum(),
            consistency: consistency_bonus(predictions),
            adaptability: adaptability_score(predictions),
            niche: self.niches.bonus(player.niche(), draw),
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn consistency_bonus(predictions: &[NumberSet]) -> f32 {
    if predictions.len() < 2 {
        return 0.0;
    }
    let consistent = predictions
        .windows(2)
        .filter(|pair| pair[0].intersection_len(pair[1]) >= CONSISTENT_OVERLAP)
        .count();
    let pairs = usize::max(1, predictions.len() - 1);
    consistent as f32 / pairs as f32 * SUB_SCORE_SCALE
}

#[expect(clippy::cast_precision_loss)]
fn adaptability_score(predictions: &[NumberSet]) -> f32 {
    if predictions.len() < ADAPTABILITY_WINDOW {
        return 0.0;
    }
    let distinct = predictions[predictions.len() - ADAPTABILITY_WINDOW..]
        .iter()
        .fold(NumberSet::EMPTY, |acc, p| acc.union(*p))
        .len();
    (distinct as f32 / ADAPTABILITY_TARGET * SUB_SCORE_SCALE).min(SUB_SCORE_SCALE)
}

#[cfg(test)]
mod tests {
    use drawforge_engine::{Niche, PlayerId, Weights};

    use super::*;

    fn set(numbers: &[i64]) -> NumberSet {
        NumberSet::new(numbers.iter().copied()).unwrap()
    }

    fn player(niche: Niche, predictions: Vec<NumberSet>) -> Player {
        Player::new(PlayerId(1), Weights::from_fn(|_| 0.5), niche, 1).with_predictions(predictions)
    }

    fn range(start: i64, end: i64) -> NumberSet {
        NumberSet::new(start..=end).unwrap()
    }

    #[test]
    fn test_even_niche_without_history() {
        let evaluator = FitnessEvaluator::new();
        let draw = set(&[1, 2, 3, 4, 5]);
        let fitness = evaluator.evaluate(&player(Niche::EvenAffinity, vec![]), draw);
        assert_eq!(fitness, 1.5);
    }

    #[test]
    fn test_empty_history_is_niche_only() {
        let evaluator = FitnessEvaluator::new();
        let draw = set(&[1, 2, 3, 7, 10, 11, 12, 20]);
        for niche in Niche::ALL {
            let player = player(niche, vec![]);
            let expected = NicheClassifier.bonus(niche, draw) * NICHE_WEIGHT;
            assert_eq!(evaluator.evaluate(&player, draw), expected);
            let breakdown = evaluator.breakdown(&player, draw);
            assert_eq!(breakdown.matches, 0);
            assert_eq!(breakdown.consistency, 0.0);
            assert_eq!(breakdown.adaptability, 0.0);
        }
    }

    #[test]
    fn test_matches_sum_over_history() {
        let evaluator = FitnessEvaluator::new();
        let draw = set(&[1, 2, 3, 4]);
        let player = player(Niche::General, vec![set(&[1, 2, 9]), set(&[3, 10]), set(&[20])]);
        let breakdown = evaluator.breakdown(&player, draw);
        assert_eq!(breakdown.matches, 3);
        // two non-overlapping pairs, no consistency
        assert_eq!(breakdown.consistency, 0.0);
        assert!((breakdown.total() - (3.0 * 2.0 + 0.3 * 1.5)).abs() < 1e-6);
    }

    #[test]
    fn test_consistency_bonus() {
        // pairs: (1..15, 1..15) share 15, (1..15, 11..25) share 5
        let predictions = vec![range(1, 15), range(1, 15), range(11, 25)];
        assert!((consistency_bonus(&predictions) - 2.5).abs() < 1e-6);
        assert_eq!(consistency_bonus(&predictions[..1]), 0.0);
        assert_eq!(consistency_bonus(&[]), 0.0);
    }

    #[test]
    fn test_adaptability_score() {
        // last five predictions cover 1..=15: exactly 60% of the universe
        let predictions = vec![
            range(20, 25),
            range(1, 3),
            range(4, 6),
            range(7, 9),
            range(10, 12),
            range(13, 15),
        ];
        assert!((adaptability_score(&predictions) - 5.0).abs() < 1e-6);

        let narrow = vec![range(1, 3); 5];
        assert!((adaptability_score(&narrow) - 1.0).abs() < 1e-6);

        assert_eq!(adaptability_score(&narrow[..4]), 0.0);
    }

    #[test]
    fn test_adaptability_is_capped() {
        let predictions = vec![
            range(1, 5),
            range(6, 10),
            range(11, 15),
            range(16, 20),
            range(21, 25),
        ];
        assert_eq!(adaptability_score(&predictions), 5.0);
    }

    #[test]
    fn test_evaluate_raw_malformed_draw_scores_zero() {
        let evaluator = FitnessEvaluator::new();
        let player = player(Niche::General, vec![set(&[1, 2])]);
        assert_eq!(evaluator.evaluate_raw(&player, &[1, 1, 2]), 0.0);
        assert_eq!(evaluator.evaluate_raw(&player, &[0, 30]), 0.0);
        assert!((evaluator.evaluate_raw(&player, &[1, 2]) - (4.0 + 0.45)).abs() < 1e-6);
    }
}
