use rand::{
    Rng,
    distr::{Distribution, StandardUniform},
    seq::IndexedRandom as _,
};
use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Categorical specialization of a player.
///
/// The niche decides which property of a draw the player is rewarded for when
/// its fitness is computed. Serialized as its discriminant (`0..=3`).
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum Niche {
    /// Rewards even numbers in the draw.
    EvenAffinity = 0,
    /// Rewards odd numbers in the draw.
    OddAffinity = 1,
    /// Rewards runs of consecutive numbers in the draw.
    SequenceAffinity = 2,
    /// Flat bonus, no specialization.
    #[default]
    General = 3,
}

impl Niche {
    pub const LEN: usize = 4;
    pub const ALL: [Self; Self::LEN] = [
        Self::EvenAffinity,
        Self::OddAffinity,
        Self::SequenceAffinity,
        Self::General,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EvenAffinity => "even",
            Self::OddAffinity => "odd",
            Self::SequenceAffinity => "sequence",
            Self::General => "general",
        }
    }
}

impl TryFrom<u8> for Niche {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(ValidationError::UnknownNiche { value })
    }
}

impl From<Niche> for u8 {
    fn from(niche: Niche) -> Self {
        niche as u8
    }
}

/// Samples a niche uniformly with `rng.random::<Niche>()`.
impl Distribution<Niche> for StandardUniform {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Niche {
        *Niche::ALL
            .choose(rng)
            .expect("niche list is never empty")
    }
}
