use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinate::Coordinate;

/// A single fix pushed by a position source. Accuracy and timestamp are carried
/// along for collaborators; tracking only looks at the coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    pub accuracy: Option<f64>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl PositionSample {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            accuracy: None,
            timestamp: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

impl From<Coordinate> for PositionSample {
    fn from(coordinate: Coordinate) -> Self {
        Self::new(coordinate)
    }
}

/// Failure reported by a position source instead of a sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    Unavailable(String),
    #[error("timed out waiting for a position")]
    Timeout,
}
