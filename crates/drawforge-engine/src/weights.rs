use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::{ValidationError, WEIGHT_COUNT};

/// A player's weight vector: exactly [`WEIGHT_COUNT`] values in `[0, 1]`.
///
/// Every constructor either validates its input or clamps generated values, so a
/// `Weights` value always satisfies the length and range invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Weights {
    values: Vec<f32>,
}

impl Weights {
    /// Validates a raw weight vector.
    pub fn new(values: Vec<f32>) -> Result<Self, ValidationError> {
        if values.len() != WEIGHT_COUNT {
            return Err(ValidationError::WeightCount {
                expected: WEIGHT_COUNT,
                actual: values.len(),
            });
        }
        if let Some((index, &value)) = values
            .iter()
            .enumerate()
            .find(|(_, w)| !(0.0..=1.0).contains(*w))
        {
            return Err(ValidationError::WeightOutOfRange { index, value });
        }
        Ok(Self { values })
    }

    /// Builds a weight vector by applying `f` to each index.
    ///
    /// Results are clamped to `[0, 1]`; `NaN` becomes `0`.
    ///
    /// ```
    /// use drawforge_engine::{WEIGHT_COUNT, Weights};
    ///
    /// let weights = Weights::from_fn(|i| i as f32 / 4.0);
    /// assert_eq!(weights.len(), WEIGHT_COUNT);
    /// assert_eq!(weights[2], 0.5);
    /// assert_eq!(weights[10], 1.0);
    /// ```
    pub fn from_fn<F>(mut f: F) -> Self
    where
        F: FnMut(usize) -> f32,
    {
        let values = (0..WEIGHT_COUNT).map(|i| clamp_unit(f(i))).collect();
        Self { values }
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        self.values.iter().copied()
    }
}

fn clamp_unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl Index<usize> for Weights {
    type Output = f32;

    fn index(&self, index: usize) -> &Self::Output {
        &self.values[index]
    }
}

impl TryFrom<Vec<f32>> for Weights {
    type Error = ValidationError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::new(values)
    }
}

impl From<Weights> for Vec<f32> {
    fn from(weights: Weights) -> Self {
        weights.values
    }
}
