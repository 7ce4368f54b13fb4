//! Fold-based precision/recall metrics for prediction histories.
//!
//! A prediction history is split into `folds` consecutive, equally sized folds
//! (the remainder is dropped). Every number of a prediction is a true positive
//! when it was drawn and a false positive otherwise; drawn numbers missing from
//! the prediction are false negatives.

use drawforge_engine::NumberSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationMetrics {
    pub accuracy: f32,
    pub precision: f32,
    pub recall: f32,
    pub f1_score: f32,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Confusion {
    true_positives: usize,
    false_positives: usize,
    false_negatives: usize,
}

impl Confusion {
    fn add(&mut self, prediction: NumberSet, actual: NumberSet) {
        let hits = prediction.intersection_len(actual);
        self.true_positives += hits;
        self.false_positives += prediction.len() - hits;
        self.false_negatives += actual.len() - hits;
    }

    fn metrics(self) -> ValidationMetrics {
        let tp = self.true_positives;
        let precision = ratio(tp, tp + self.false_positives);
        let recall = ratio(tp, tp + self.false_negatives);
        let accuracy = ratio(tp, tp + self.false_positives + self.false_negatives);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        ValidationMetrics {
            accuracy,
            precision,
            recall,
            f1_score,
        }
    }
}

#[expect(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 { 0.0 } else { num as f32 / den as f32 }
}

/// Metrics of one batch of predictions against the matching draws.
///
/// Extra elements of the longer slice are ignored.
#[must_use]
pub fn metrics(predictions: &[NumberSet], actual: &[NumberSet]) -> ValidationMetrics {
    let mut confusion = Confusion::default();
    for (prediction, drawn) in predictions.iter().zip(actual) {
        confusion.add(*prediction, *drawn);
    }
    confusion.metrics()
}

/// Splits paired predictions and draws into `folds` folds and scores each.
///
/// Returns one entry per fold; an empty vector when `folds` is zero. Folds are
/// empty (all metrics `0`) when there are fewer pairs than folds.
#[must_use]
pub fn cross_validate(
    predictions: &[NumberSet],
    actual: &[NumberSet],
    folds: usize,
) -> Vec<ValidationMetrics> {
    if folds == 0 {
        return vec![];
    }
    let pairs = usize::min(predictions.len(), actual.len());
    let fold_size = pairs / folds;
    (0..folds)
        .map(|i| {
            let range = i * fold_size..(i + 1) * fold_size;
            metrics(&predictions[range.clone()], &actual[range])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(numbers: &[i64]) -> NumberSet {
        NumberSet::new(numbers.iter().copied()).unwrap()
    }

    #[test]
    fn test_metrics() {
        // tp = 2, fp = 1, fn = 2
        let m = metrics(&[set(&[1, 2, 3])], &[set(&[1, 2, 4, 5])]);
        assert!((m.precision - 2.0 / 3.0).abs() < 1e-6);
        assert!((m.recall - 0.5).abs() < 1e-6);
        assert!((m.accuracy - 0.4).abs() < 1e-6);
        let f1 = 2.0 * (2.0 / 3.0) * 0.5 / (2.0 / 3.0 + 0.5);
        assert!((m.f1_score - f1).abs() < 1e-6);
    }

    #[test]
    fn test_zero_denominators() {
        assert_eq!(metrics(&[], &[]), ValidationMetrics::default());
        let m = metrics(&[set(&[1])], &[set(&[2])]);
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_cross_validate_folds() {
        let predictions = vec![set(&[1, 2]), set(&[1, 2]), set(&[3]), set(&[3]), set(&[9])];
        let actual = vec![set(&[1, 2]), set(&[1, 2]), set(&[4]), set(&[4]), set(&[9])];
        let folds = cross_validate(&predictions, &actual, 2);
        assert_eq!(folds.len(), 2);
        assert_eq!(folds[0].precision, 1.0);
        assert_eq!(folds[1].precision, 0.0);

        assert!(cross_validate(&predictions, &actual, 0).is_empty());
        let sparse = cross_validate(&predictions, &actual, 10);
        assert_eq!(sparse.len(), 10);
        assert!(sparse.iter().all(|m| *m == ValidationMetrics::default()));
    }
}
