//! Per-number features used by the weighted predictor.
//!
//! Each feature maps a candidate number and the draw history to a value in
//! `[0.0, 1.0]`. A player's weight vector holds one weight per feature, in the
//! order of [`NumberFeature::ALL`].
//!
//! # Feature Groups
//!
//! - **Recency**: presence in the last three draws, draws since last seen
//! - **Frequency**: share of the last 5 / last 10 / all draws containing the number
//! - **Arithmetic**: parity, primes, Fibonacci numbers, low/high half
//! - **Layout**: row and column on the 5×5 betting card
//! - **Neighbourhood**: whether an adjacent number was in the last draw

use drawforge_engine::{DrawHistory, NUMBER_UNIVERSE, NumberSet, WEIGHT_COUNT};

const SLOTS: usize = NUMBER_UNIVERSE as usize + 1;
const GRID_SIDE: u8 = 5;
const PRIMES: [u8; 9] = [2, 3, 5, 7, 11, 13, 17, 19, 23];
const FIBONACCI: [u8; 6] = [1, 2, 3, 5, 8, 13];
const FIBONACCI_MAX_IN_UNIVERSE: u8 = 21;

/// A single per-number feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberFeature {
    InLastDraw,
    InSecondLastDraw,
    InThirdLastDraw,
    FrequencyLast5,
    FrequencyLast10,
    FrequencyOverall,
    Recency,
    Even,
    Odd,
    Prime,
    Fibonacci,
    LowHalf,
    HighHalf,
    GridRow,
    GridColumn,
    LowerNeighbourDrawn,
    UpperNeighbourDrawn,
}

impl NumberFeature {
    /// All features, in weight-vector order.
    pub const ALL: [Self; WEIGHT_COUNT] = [
        Self::InLastDraw,
        Self::InSecondLastDraw,
        Self::InThirdLastDraw,
        Self::FrequencyLast5,
        Self::FrequencyLast10,
        Self::FrequencyOverall,
        Self::Recency,
        Self::Even,
        Self::Odd,
        Self::Prime,
        Self::Fibonacci,
        Self::LowHalf,
        Self::HighHalf,
        Self::GridRow,
        Self::GridColumn,
        Self::LowerNeighbourDrawn,
        Self::UpperNeighbourDrawn,
    ];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::InLastDraw => "in_last_draw",
            Self::InSecondLastDraw => "in_second_last_draw",
            Self::InThirdLastDraw => "in_third_last_draw",
            Self::FrequencyLast5 => "frequency_last_5",
            Self::FrequencyLast10 => "frequency_last_10",
            Self::FrequencyOverall => "frequency_overall",
            Self::Recency => "recency",
            Self::Even => "even",
            Self::Odd => "odd",
            Self::Prime => "prime",
            Self::Fibonacci => "fibonacci",
            Self::LowHalf => "low_half",
            Self::HighHalf => "high_half",
            Self::GridRow => "grid_row",
            Self::GridColumn => "grid_column",
            Self::LowerNeighbourDrawn => "lower_neighbour_drawn",
            Self::UpperNeighbourDrawn => "upper_neighbour_drawn",
        }
    }

    /// Feature value of `number` in `[0.0, 1.0]`.
    #[must_use]
    pub fn value(self, number: u8, context: &FeatureContext) -> f32 {
        let flag = |b: bool| if b { 1.0 } else { 0.0 };
        let n = usize::from(number);
        match self {
            Self::InLastDraw => flag(context.recent[0].contains(number)),
            Self::InSecondLastDraw => flag(context.recent[1].contains(number)),
            Self::InThirdLastDraw => flag(context.recent[2].contains(number)),
            Self::FrequencyLast5 => context.last5.ratio(n),
            Self::FrequencyLast10 => context.last10.ratio(n),
            Self::FrequencyOverall => context.overall.ratio(n),
            Self::Recency => context.recency(n),
            Self::Even => flag(number % 2 == 0),
            Self::Odd => flag(number % 2 != 0),
            Self::Prime => flag(PRIMES.contains(&number)),
            Self::Fibonacci => flag(FIBONACCI.contains(&number) || number == FIBONACCI_MAX_IN_UNIVERSE),
            Self::LowHalf => flag(number <= NUMBER_UNIVERSE / 2),
            Self::HighHalf => flag(number > NUMBER_UNIVERSE / 2),
            Self::GridRow => f32::from((number - 1) / GRID_SIDE) / f32::from(GRID_SIDE - 1),
            Self::GridColumn => f32::from((number - 1) % GRID_SIDE) / f32::from(GRID_SIDE - 1),
            Self::LowerNeighbourDrawn => flag(number > 1 && context.recent[0].contains(number - 1)),
            Self::UpperNeighbourDrawn => flag(context.recent[0].contains(number + 1)),
        }
    }
}

/// Appearance counts over a window of draws.
#[derive(Debug, Clone)]
struct Counts {
    draws: usize,
    hits: [u32; SLOTS],
}

impl Counts {
    fn new(draws: &[drawforge_engine::DrawRecord]) -> Self {
        let mut hits = [0; SLOTS];
        for draw in draws {
            for n in draw.numbers.iter() {
                hits[usize::from(n)] += 1;
            }
        }
        Self {
            draws: draws.len(),
            hits,
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn ratio(&self, n: usize) -> f32 {
        if self.draws == 0 {
            0.0
        } else {
            self.hits[n] as f32 / self.draws as f32
        }
    }
}

/// History-derived data shared by all feature computations of one prediction.
#[derive(Debug, Clone)]
pub struct FeatureContext {
    recent: [NumberSet; 3],
    last5: Counts,
    last10: Counts,
    overall: Counts,
    draws_since_seen: [Option<usize>; SLOTS],
}

impl FeatureContext {
    #[must_use]
    pub fn new(history: &DrawHistory) -> Self {
        let recent =
            std::array::from_fn(|back| history.nth_back(back).map_or(NumberSet::EMPTY, |d| d.numbers));
        let mut draws_since_seen = [None; SLOTS];
        for (back, draw) in history.as_slice().iter().rev().enumerate() {
            for n in draw.numbers.iter() {
                draws_since_seen[usize::from(n)].get_or_insert(back);
            }
        }
        Self {
            recent,
            last5: Counts::new(history.recent(5)),
            last10: Counts::new(history.recent(10)),
            overall: Counts::new(history.as_slice()),
            draws_since_seen,
        }
    }

    #[expect(clippy::cast_precision_loss)]
    fn recency(&self, n: usize) -> f32 {
        self.draws_since_seen[n].map_or(0.0, |gap| 1.0 / (1.0 + gap as f32))
    }

    /// Feature vector of `number`, in [`NumberFeature::ALL`] order.
    #[must_use]
    pub fn features(&self, number: u8) -> [f32; WEIGHT_COUNT] {
        NumberFeature::ALL.map(|f| f.value(number, self))
    }
}

#[cfg(test)]
mod tests {
    use drawforge_engine::DrawRecord;

    use super::*;

    fn history(draws: &[&[i64]]) -> DrawHistory {
        draws
            .iter()
            .zip(1..)
            .map(|(numbers, draw_index)| DrawRecord {
                draw_index,
                date: None,
                numbers: NumberSet::new(numbers.iter().copied()).unwrap(),
            })
            .collect()
    }

    #[test]
    fn test_all_values_in_unit_range() {
        let history = history(&[&[1, 2, 3], &[3, 4, 25], &[1, 24, 25]]);
        let context = FeatureContext::new(&history);
        for n in 1..=NUMBER_UNIVERSE {
            for value in context.features(n) {
                assert!((0.0..=1.0).contains(&value), "{n}: {value}");
            }
        }
    }

    #[test]
    fn test_empty_history() {
        let context = FeatureContext::new(&DrawHistory::new());
        assert_eq!(NumberFeature::InLastDraw.value(7, &context), 0.0);
        assert_eq!(NumberFeature::FrequencyOverall.value(7, &context), 0.0);
        assert_eq!(NumberFeature::Recency.value(7, &context), 0.0);
        assert_eq!(NumberFeature::Prime.value(7, &context), 1.0);
    }

    #[test]
    fn test_recency_and_frequency() {
        let history = history(&[&[1, 2], &[2, 3], &[3]]);
        let context = FeatureContext::new(&history);
        assert_eq!(NumberFeature::Recency.value(3, &context), 1.0);
        assert_eq!(NumberFeature::Recency.value(2, &context), 0.5);
        assert!((NumberFeature::Recency.value(1, &context) - 1.0 / 3.0).abs() < 1e-6);
        assert!((NumberFeature::FrequencyOverall.value(2, &context) - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(NumberFeature::InSecondLastDraw.value(2, &context), 1.0);
        assert_eq!(NumberFeature::InThirdLastDraw.value(1, &context), 1.0);
    }

    #[test]
    fn test_layout_and_neighbours() {
        let history = history(&[&[10]]);
        let context = FeatureContext::new(&history);
        assert_eq!(NumberFeature::GridRow.value(1, &context), 0.0);
        assert_eq!(NumberFeature::GridRow.value(25, &context), 1.0);
        assert_eq!(NumberFeature::GridColumn.value(5, &context), 1.0);
        assert_eq!(NumberFeature::LowerNeighbourDrawn.value(11, &context), 1.0);
        assert_eq!(NumberFeature::UpperNeighbourDrawn.value(9, &context), 1.0);
        assert_eq!(NumberFeature::UpperNeighbourDrawn.value(11, &context), 0.0);
        assert_eq!(NumberFeature::LowerNeighbourDrawn.value(1, &context), 0.0);
    }
}
