use std::fmt;

use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
};
use serde::{Deserialize, Serialize};

use crate::{Niche, NumberSet, Weights};

/// Identifier of a player, unique within one generation only.
///
/// Reproduction draws fresh random ids, so an id does not identify a lineage
/// across generations.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl Distribution<PlayerId> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> PlayerId {
        PlayerId(rng.random())
    }
}

/// One candidate solution in the evolutionary population.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    id: PlayerId,
    score: u32,
    predictions: Vec<NumberSet>,
    weights: Weights,
    // Recomputed every generation; never persisted meaningfully across ticks.
    #[serde(default, skip_serializing)]
    fitness: f32,
    generation: u32,
    age: u32,
    niche: Niche,
}

impl Player {
    /// Creates a fresh player with no history.
    #[must_use]
    pub fn new(id: PlayerId, weights: Weights, niche: Niche, generation: u32) -> Self {
        Self {
            id,
            score: 0,
            predictions: vec![],
            weights,
            fitness: 0.0,
            generation,
            age: 0,
            niche,
        }
    }

    #[must_use]
    pub fn id(&self) -> PlayerId {
        self.id
    }

    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    #[must_use]
    pub fn predictions(&self) -> &[NumberSet] {
        &self.predictions
    }

    #[must_use]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// Fitness computed at the latest generation boundary.
    #[must_use]
    pub fn fitness(&self) -> f32 {
        self.fitness
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Number of generations this player has survived.
    #[must_use]
    pub fn age(&self) -> u32 {
        self.age
    }

    #[must_use]
    pub fn niche(&self) -> Niche {
        self.niche
    }

    /// Returns this player with a different id.
    #[must_use]
    pub fn with_id(mut self, id: PlayerId) -> Self {
        self.id = id;
        self
    }

    /// Returns this player with its history replaced.
    #[must_use]
    pub fn with_predictions(mut self, predictions: Vec<NumberSet>) -> Self {
        self.predictions = predictions;
        self
    }

    /// Returns this player with a fixed age.
    #[must_use]
    pub fn with_age(mut self, age: u32) -> Self {
        self.age = age;
        self
    }

    /// Appends the prediction made for a draw and credits its hits to `score`.
    pub fn record_prediction(&mut self, prediction: NumberSet, draw: NumberSet) {
        let hits = u32::try_from(prediction.intersection_len(draw)).unwrap_or(u32::MAX);
        self.score = self.score.saturating_add(hits);
        self.predictions.push(prediction);
    }

    pub fn set_fitness(&mut self, fitness: f32) {
        self.fitness = fitness;
    }

    /// Marks the player as having survived one more generation.
    pub fn grow_older(&mut self) {
        self.age += 1;
    }
}
