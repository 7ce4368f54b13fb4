//! Evolving a population of number-prediction players.
//!
//! # How Evolution Works
//!
//! Every revealed draw advances the population by one generation:
//!
//! 1. **Evaluate** - Each player predicts the draw from the history so far, then its
//!    fitness is recomputed against the revealed numbers
//! 2. **Rank** - Players are ordered by fitness (younger first on ties)
//! 3. **Select / Reproduce** - The top players survive and age; the remaining slots
//!    are filled with crossover children and mutation clones of tournament winners
//! 4. **Replace** - The new generation is committed in one step
//!
//! # Architecture
//!
//! ```text
//! DrawRecord
//!     ↓ tick
//! PopulationManager ──→ Predictor / FitnessEvaluator (drawforge-evaluator)
//!     ↓ reproduces with
//! MutationOperator / CrossoverOperator
//!     ↓ produces
//! GenerationReport, PopulationSnapshot
//! ```
//!
//! # Modules
//!
//! - [`population`] - The per-generation state machine and its persistence form
//! - [`operators`] - Mutation, crossover and tournament selection
//! - [`weights`] - Weight vector initialization and perturbation
//! - [`stats`] - Fitness summaries for generation reports

pub mod operators;
pub mod population;
pub mod stats;
pub mod weights;
