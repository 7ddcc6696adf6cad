use std::fmt;

use crate::{loop_validator::LoopOutcome, position::PositionError};

/// What a finished run looked like at the moment it was stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopReport {
    pub outcome: LoopOutcome,
    pub elapsed_seconds: u64,
    pub total_distance_meters: f64,
    pub threshold_meters: f64,
}

impl fmt::Display for StopReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.outcome {
            LoopOutcome::Indeterminate => write!(f, "Not enough points to validate the loop"),
            LoopOutcome::Invalid { closing_distance } => write!(
                f,
                "Invalid loop! Start and end are {:.0}m apart (must be < {:.0}m)",
                closing_distance, self.threshold_meters
            ),
            LoopOutcome::Valid { .. } => write!(
                f,
                "Valid loop! Time: {}s, Distance: {:.0}m",
                self.elapsed_seconds, self.total_distance_meters
            ),
        }
    }
}

/// The latest user-visible condition of a tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    Started,
    PositionUnavailable(PositionError),
    Finished(StopReport),
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Started => write!(f, "Tracking started..."),
            RunStatus::PositionUnavailable(err) => write!(f, "GPS Error: {err}"),
            RunStatus::Finished(report) => report.fmt(f),
        }
    }
}

/// `m:ss`
pub fn format_elapsed(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcome: LoopOutcome) -> StopReport {
        StopReport {
            outcome,
            elapsed_seconds: 754,
            total_distance_meters: 1234.4,
            threshold_meters: 50.,
        }
    }

    #[test]
    fn messages() {
        assert_eq!(RunStatus::Started.to_string(), "Tracking started...");
        assert_eq!(
            RunStatus::PositionUnavailable(PositionError::PermissionDenied).to_string(),
            "GPS Error: location permission denied"
        );
        assert_eq!(
            report(LoopOutcome::Valid { closing_distance: 3.3 }).to_string(),
            "Valid loop! Time: 754s, Distance: 1234m"
        );
        assert_eq!(
            RunStatus::Finished(report(LoopOutcome::Invalid { closing_distance: 2101.7 })).to_string(),
            "Invalid loop! Start and end are 2102m apart (must be < 50m)"
        );
        assert_eq!(
            report(LoopOutcome::Indeterminate).to_string(),
            "Not enough points to validate the loop"
        );
    }

    #[test]
    fn elapsed_formatting() {
        assert_eq!(format_elapsed(0), "0:00");
        assert_eq!(format_elapsed(59), "0:59");
        assert_eq!(format_elapsed(754), "12:34");
        assert_eq!(format_elapsed(3600), "60:00");
    }
}
