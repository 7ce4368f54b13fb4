use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{NUMBER_UNIVERSE, ValidationError};

// Bits 1..=25 are the valid numbers; bit 0 and bits 26.. are never set.
const UNIVERSE_MASK: u32 = ((1 << (NUMBER_UNIVERSE as u32 + 1)) - 1) & !1;

/// A set of numbers from the `1..=NUMBER_UNIVERSE` universe.
///
/// Stored as a 32-bit mask where bit `n` marks number `n`, so membership and
/// intersection size are single bit operations. Iteration always yields numbers
/// in ascending order.
///
/// Serialized as a JSON array of integers; deserialization validates the values.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<i64>", into = "Vec<u8>")]
pub struct NumberSet {
    bits: u32,
}

impl NumberSet {
    pub const EMPTY: Self = Self { bits: 0 };

    /// Builds a set from raw values, rejecting out-of-range and repeated numbers.
    pub fn new<I>(values: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = i64>,
    {
        let mut bits = 0;
        for value in values {
            let number = u8::try_from(value)
                .ok()
                .filter(|n| (1..=NUMBER_UNIVERSE).contains(n))
                .ok_or(ValidationError::NumberOutOfRange { value })?;
            let bit = 1 << number;
            if bits & bit != 0 {
                return Err(ValidationError::DuplicateNumber { value: number });
            }
            bits |= bit;
        }
        Ok(Self { bits })
    }

    /// Builds a set from numbers already known to be inside the universe.
    ///
    /// Numbers outside the universe are ignored and duplicates collapse.
    #[must_use]
    pub fn from_numbers<I>(numbers: I) -> Self
    where
        I: IntoIterator<Item = u8>,
    {
        let bits = numbers
            .into_iter()
            .filter(|n| (1..=NUMBER_UNIVERSE).contains(n))
            .fold(0, |bits, n| bits | (1 << n));
        Self { bits }
    }

    /// Returns every number of the universe.
    #[must_use]
    pub const fn universe() -> Self {
        Self {
            bits: UNIVERSE_MASK,
        }
    }

    #[must_use]
    pub fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    #[must_use]
    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub fn contains(self, number: u8) -> bool {
        number <= NUMBER_UNIVERSE && self.bits & (1 << number) != 0
    }

    /// Number of values present in both sets.
    #[must_use]
    pub fn intersection_len(self, other: Self) -> usize {
        (self.bits & other.bits).count_ones() as usize
    }

    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Iterates over the numbers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        (1..=NUMBER_UNIVERSE).filter(move |&n| self.contains(n))
    }

    /// Counts the length-3 runs of consecutive numbers (overlapping windows).
    ///
    /// `[1, 2, 3, 4]` contains two runs: `1-2-3` and `2-3-4`.
    #[must_use]
    pub fn consecutive_triples(self) -> usize {
        (self.bits & (self.bits >> 1) & (self.bits >> 2)).count_ones() as usize
    }
}

impl TryFrom<Vec<i64>> for NumberSet {
    type Error = ValidationError;

    fn try_from(values: Vec<i64>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<NumberSet> for Vec<u8> {
    fn from(set: NumberSet) -> Self {
        set.iter().collect()
    }
}

impl fmt::Display for NumberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, n) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{n:2}")?;
        }
        f.write_str("]")
    }
}
