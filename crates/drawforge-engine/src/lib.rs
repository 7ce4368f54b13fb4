//! Domain types shared by every drawforge crate.
//!
//! This crate defines the values the evolutionary engine and the checkpoint layer
//! operate on:
//!
//! - [`NumberSet`] - A set of drawn (or predicted) numbers from the `1..=25` universe
//! - [`DrawRecord`] / [`DrawHistory`] - Historical draws, consumed one per generation
//! - [`Player`] - One candidate solution: a [`Weights`] vector plus bookkeeping
//! - [`Niche`] - Categorical specialization that biases fitness scoring
//! - [`EvolutionSeed`] - 128-bit seed for reproducible evolution runs
//!
//! # Validated Construction
//!
//! Every type that can be built from loosely-typed input (JSON files, raw integer
//! vectors) goes through a fallible constructor returning [`ValidationError`].
//! Once a value exists it is well formed, so downstream code never re-checks shapes:
//!
//! ```
//! use drawforge_engine::{NumberSet, ValidationError};
//!
//! let draw = NumberSet::new([3, 1, 2]).unwrap();
//! assert_eq!(draw.iter().collect::<Vec<_>>(), [1, 2, 3]);
//!
//! assert!(matches!(
//!     NumberSet::new([1, 1]),
//!     Err(ValidationError::DuplicateNumber { value: 1 })
//! ));
//! ```

pub use self::{draw::*, niche::*, number_set::*, player::*, seed::*, weights::*};

mod draw;
mod niche;
mod number_set;
mod player;
mod seed;
mod weights;

/// Largest number that can be drawn. Numbers range over `1..=NUMBER_UNIVERSE`.
pub const NUMBER_UNIVERSE: u8 = 25;

/// Number of values a player predicts for each draw.
pub const DRAW_SIZE: usize = 15;

/// Length of every player's weight vector.
pub const WEIGHT_COUNT: usize = 17;

/// Malformed player, draw or niche data.
#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ValidationError {
    #[display("number {value} is outside 1..={NUMBER_UNIVERSE}")]
    NumberOutOfRange { value: i64 },
    #[display("number {value} appears more than once")]
    DuplicateNumber { value: u8 },
    #[display("expected {expected} weights, got {actual}")]
    WeightCount { expected: usize, actual: usize },
    #[display("weight #{index} is {value}, expected a finite value in [0, 1]")]
    WeightOutOfRange { index: usize, value: f32 },
    #[display("unknown niche {value}")]
    UnknownNiche { value: u8 },
    #[display("invalid seed {value:?}: expected 32 hex digits or a decimal integer")]
    InvalidSeed { value: String },
}
