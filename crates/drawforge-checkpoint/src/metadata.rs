use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of the training run that produced a checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub timestamp: DateTime<Utc>,
    pub accuracy: f32,
    pub loss: f32,
    pub epochs: usize,
    /// Number of draws the training set was built from.
    pub draws_count: usize,
}
