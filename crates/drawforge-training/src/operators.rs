//! Reproduction operators.
//!
//! # Mutation
//!
//! The per-weight mutation rate grows with the parent's age, so long-lived
//! survivors explore more aggressively:
//!
//! ```text
//! rate = min(base_rate × (1 + age / 50), 1)
//! ```
//!
//! Each selected weight is scaled by `1 + u`, `u ~ U[-0.05, 0.05]`.
//!
//! # Crossover
//!
//! Uniform crossover biased toward the fitter parent: each weight comes from
//! parent `a` with probability `0.5 + bias` when `a` is fitter, `0.5 - bias`
//! when `b` is fitter and `0.5` on a tie. The child inherits the fitter parent's
//! niche (parent `b`'s on a tie) with probability `niche_inheritance`.
//!
//! Both operators return a fresh player: random id, `age = 0`, no predictions,
//! `score = 0`, `fitness = 0`.

use std::collections::HashSet;

use drawforge_engine::{Player, PlayerId};
use drawforge_evaluator::niche::NicheClassifier;
use rand::{Rng, seq::index};
use serde::{Deserialize, Serialize};

use crate::weights;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MutationOperator {
    /// Per-weight mutation probability of a newborn parent.
    pub base_rate: f64,
    /// Age at which the rate has doubled.
    pub age_scale: f64,
    /// Probability the clone keeps its parent's niche.
    pub niche_retention: f64,
}

impl Default for MutationOperator {
    fn default() -> Self {
        Self {
            base_rate: 0.1,
            age_scale: 50.0,
            niche_retention: 0.9,
        }
    }
}

impl MutationOperator {
    /// Mutation rate applied to a parent of the given age.
    #[must_use]
    pub fn rate(&self, age: u32) -> f64 {
        let scale = if self.age_scale > 0.0 {
            1.0 + f64::from(age) / self.age_scale
        } else {
            1.0
        };
        (self.base_rate * scale).clamp(0.0, 1.0)
    }

    /// Creates a mutated clone of `parent`.
    pub fn mutate<R>(&self, parent: &Player, rng: &mut R) -> Player
    where
        R: Rng + ?Sized,
    {
        let weights = weights::jitter(parent.weights(), self.rate(parent.age()), rng);
        let niche = NicheClassifier.inherit(parent.niche(), self.niche_retention, rng);
        Player::new(rng.random(), weights, niche, parent.generation() + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CrossoverOperator {
    /// Shift of the per-weight pick probability toward the fitter parent.
    pub fitness_bias: f64,
    /// Probability the child keeps the fitter parent's niche.
    pub niche_inheritance: f64,
}

impl Default for CrossoverOperator {
    fn default() -> Self {
        Self {
            fitness_bias: 0.2,
            niche_inheritance: 0.8,
        }
    }
}

impl CrossoverOperator {
    /// Probability of taking each weight from `a`.
    #[must_use]
    pub fn pick_probability(&self, a: &Player, b: &Player) -> f64 {
        if a.fitness() > b.fitness() {
            0.5 + self.fitness_bias
        } else if a.fitness() < b.fitness() {
            0.5 - self.fitness_bias
        } else {
            0.5
        }
    }

    /// Creates a child of `a` and `b`.
    pub fn crossover<R>(&self, a: &Player, b: &Player, rng: &mut R) -> Player
    where
        R: Rng + ?Sized,
    {
        let weights = weights::uniform_pick(a.weights(), b.weights(), self.pick_probability(a, b), rng);
        let preferred = if a.fitness() > b.fitness() {
            a.niche()
        } else {
            b.niche()
        };
        let niche = NicheClassifier.inherit(preferred, self.niche_inheritance, rng);
        let generation = u32::max(a.generation(), b.generation()) + 1;
        Player::new(rng.random(), weights, niche, generation)
    }
}

/// Picks the best-ranked of `tournament_size` distinct random entries of `ranked`.
///
/// `ranked` must be in ranking order (best first), so the winner is the sampled
/// entry with the lowest index.
pub fn tournament_select<'a, R>(ranked: &'a [Player], tournament_size: usize, rng: &mut R) -> &'a Player
where
    R: Rng + ?Sized,
{
    assert!(!ranked.is_empty());
    let amount = tournament_size.clamp(1, ranked.len());
    let winner = index::sample(rng, ranked.len(), amount)
        .into_iter()
        .min()
        .expect("sample is never empty");
    &ranked[winner]
}

/// Draws a random id not yet in `taken`.
pub fn fresh_id<R>(taken: &HashSet<PlayerId>, rng: &mut R) -> PlayerId
where
    R: Rng + ?Sized,
{
    loop {
        let id = rng.random();
        if !taken.contains(&id) {
            return id;
        }
    }
}
