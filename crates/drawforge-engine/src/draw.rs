use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{NumberSet, ValidationError};

/// One historical draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDrawRecord")]
pub struct DrawRecord {
    pub draw_index: u32,
    pub date: Option<NaiveDate>,
    pub numbers: NumberSet,
}

/// Loosely-typed draw record as read from input files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDrawRecord {
    pub draw_index: u32,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub numbers: Vec<i64>,
}

impl TryFrom<RawDrawRecord> for DrawRecord {
    type Error = ValidationError;

    fn try_from(raw: RawDrawRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            draw_index: raw.draw_index,
            date: raw.date,
            numbers: NumberSet::new(raw.numbers)?,
        })
    }
}

/// Draws consumed so far, oldest first.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawHistory {
    draws: Vec<DrawRecord>,
}

impl DrawHistory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, draw: DrawRecord) {
        self.draws.push(draw);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[DrawRecord] {
        &self.draws
    }

    #[must_use]
    pub fn last(&self) -> Option<&DrawRecord> {
        self.draws.last()
    }

    /// Returns the draw `back` steps before the latest one (`0` is the latest).
    #[must_use]
    pub fn nth_back(&self, back: usize) -> Option<&DrawRecord> {
        self.draws.iter().rev().nth(back)
    }

    /// Returns up to `count` most recent draws, oldest first.
    #[must_use]
    pub fn recent(&self, count: usize) -> &[DrawRecord] {
        &self.draws[self.draws.len().saturating_sub(count)..]
    }
}

impl FromIterator<DrawRecord> for DrawHistory {
    fn from_iter<T: IntoIterator<Item = DrawRecord>>(iter: T) -> Self {
        Self {
            draws: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(index: u32, numbers: &[i64]) -> DrawRecord {
        DrawRecord {
            draw_index: index,
            date: None,
            numbers: NumberSet::new(numbers.iter().copied()).unwrap(),
        }
    }

    #[test]
    fn test_deserialize_validates_numbers() {
        let json = r#"{"draw_index": 4, "date": "2024-05-01", "numbers": [3, 1, 2]}"#;
        let record: DrawRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.draw_index, 4);
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(record.numbers.len(), 3);

        let json = r#"{"draw_index": 4, "numbers": [3, 3]}"#;
        assert!(serde_json::from_str::<DrawRecord>(json).is_err());
    }

    #[test]
    fn test_history_navigation() {
        let history: DrawHistory = (1..=4).map(|i| draw(i, &[i64::from(i)])).collect();
        assert_eq!(history.len(), 4);
        assert_eq!(history.nth_back(0).map(|d| d.draw_index), Some(4));
        assert_eq!(history.nth_back(3).map(|d| d.draw_index), Some(1));
        assert_eq!(history.nth_back(4), None);
        assert_eq!(
            history.recent(2).iter().map(|d| d.draw_index).collect::<Vec<_>>(),
            [3, 4]
        );
        assert_eq!(history.recent(10).len(), 4);
    }
}
