use serde::{Deserialize, Serialize};

use crate::{coordinate::Coordinate, geo::haversine_distance};

/// Maximum start-to-end separation of a valid loop.
pub const CLOSURE_THRESHOLD_METERS: f64 = 50.;

/// Result of checking whether a finished path closes on itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LoopOutcome {
    /// Two points or fewer. No judgment is made.
    Indeterminate,
    Invalid { closing_distance: f64 },
    Valid { closing_distance: f64 },
}

impl LoopOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, LoopOutcome::Valid { .. })
    }

    pub fn closing_distance(&self) -> Option<f64> {
        match self {
            LoopOutcome::Indeterminate => None,
            LoopOutcome::Invalid { closing_distance } | LoopOutcome::Valid { closing_distance } => Some(*closing_distance),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopValidator {
    threshold_meters: f64,
}

impl Default for LoopValidator {
    fn default() -> Self {
        Self::new(CLOSURE_THRESHOLD_METERS)
    }
}

impl LoopValidator {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    pub fn evaluate(&self, path: &[Coordinate]) -> LoopOutcome {
        let (Some(first), Some(last)) = (path.first(), path.last()) else {
            return LoopOutcome::Indeterminate;
        };
        if path.len() <= 2 {
            return LoopOutcome::Indeterminate;
        }

        let closing_distance = haversine_distance(*first, *last);
        if closing_distance > self.threshold_meters {
            LoopOutcome::Invalid { closing_distance }
        } else {
            LoopOutcome::Valid { closing_distance }
        }
    }
}

/// Evaluates `path` against the default 50 m closure threshold.
pub fn evaluate(path: &[Coordinate]) -> LoopOutcome {
    LoopValidator::default().evaluate(path)
}
