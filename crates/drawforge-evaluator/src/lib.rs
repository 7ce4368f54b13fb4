//! Scoring players against draws.
//!
//! This crate answers two questions for the evolutionary engine:
//!
//! 1. **What does a player predict?** ([`predictor`]) - A [`Predictor`](predictor::Predictor)
//!    turns a player's weight vector and the draw history into a set of numbers.
//! 2. **How good is the player?** ([`fitness`]) - The [`FitnessEvaluator`](fitness::FitnessEvaluator)
//!    scores the player's whole prediction history against the latest draw.
//!
//! # Architecture
//!
//! ```text
//! Player weights + DrawHistory
//!     ↓ Predictor (weighted sum of number features)
//! Prediction (NumberSet), appended to the player's history
//!     ↓ FitnessEvaluator (matches, consistency, adaptability, niche bonus)
//! Fitness
//!     ↓ ranks
//! PopulationManager (drawforge-training)
//! ```
//!
//! # Supporting Modules
//!
//! - [`niche`] - Niche bonuses and niche inheritance ([`NicheClassifier`](niche::NicheClassifier))
//! - [`number_feature`] - The 17 per-number features a predictor weighs
//! - [`validation`] - Fold-based precision/recall metrics for prediction histories

pub mod fitness;
pub mod niche;
pub mod number_feature;
pub mod predictor;
pub mod validation;
