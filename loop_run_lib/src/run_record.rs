use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    coordinate::Coordinate,
    loop_validator::{LoopOutcome, LoopValidator},
    run_session::{RunSession, RunState},
};

/// Summary of a validated loop run, ready to be handed to a ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    loop_id: String,
    elapsed_seconds: u64,
    distance_meters: f64,
    submitter_address: String,
}

impl RunRecord {
    pub fn loop_id(&self) -> &str {
        &self.loop_id
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn distance_meters(&self) -> f64 {
        self.distance_meters
    }

    pub fn submitter_address(&self) -> &str {
        &self.submitter_address
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl TryFrom<&[u8]> for RunRecord {
    type Error = &'static str;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        bincode::deserialize(value).map_err(|_| "Failed to deserialize RunRecord")
    }
}

/// Identifies a loop by where it starts: `loop_{lat}_{lon}` with four decimals.
/// Runs starting within the same rounded coordinate share an id.
pub fn loop_id(start: Coordinate) -> String {
    format!("loop_{}_{}", four_decimals(start.latitude), four_decimals(start.longitude))
}

/// Values that round to zero from below print as `0.0000`, not `-0.0000`.
fn four_decimals(value: f64) -> String {
    let formatted = format!("{value:.4}");
    match formatted.as_str() {
        "-0.0000" => "0.0000".to_string(),
        _ => formatted,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RecordError {
    #[error("run must be stopped before it can be submitted (currently {0})")]
    NotStopped(RunState),
    #[error("loop was not validated: {points} points recorded, need at least 3")]
    LoopNotValidated { points: usize },
    #[error("invalid loop: start and end are {closing_distance:.0}m apart (must be < {threshold_meters:.0}m)")]
    LoopInvalid { closing_distance: f64, threshold_meters: f64 },
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunRecordBuilder {
    validator: LoopValidator,
}

impl RunRecordBuilder {
    pub fn new(validator: LoopValidator) -> Self {
        Self { validator }
    }

    pub fn build(&self, session: &RunSession, submitter_address: impl Into<String>) -> Result<RunRecord, RecordError> {
        if session.state() != RunState::Stopped {
            return Err(RecordError::NotStopped(session.state()));
        }

        let path = session.path();
        let Some(start) = path.first().copied().filter(|_| path.len() >= 2) else {
            return Err(RecordError::LoopNotValidated { points: path.len() });
        };

        match self.validator.evaluate(path) {
            LoopOutcome::Indeterminate => Err(RecordError::LoopNotValidated { points: path.len() }),
            LoopOutcome::Invalid { closing_distance } => Err(RecordError::LoopInvalid {
                closing_distance,
                threshold_meters: self.validator.threshold_meters(),
            }),
            LoopOutcome::Valid { .. } => Ok(RunRecord {
                loop_id: loop_id(start),
                elapsed_seconds: session.elapsed_seconds(),
                distance_meters: session.total_distance_meters(),
                submitter_address: submitter_address.into(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, TimeDelta};

    use super::*;

    const ADDRESS: &str = "GBRUNNER";

    fn stopped_session(points: &[(f64, f64)], seconds: i64) -> RunSession {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let mut session = RunSession::new();
        session.begin(start);
        for point in points {
            session.record((*point).into());
        }
        session.update_elapsed(start + TimeDelta::seconds(seconds));
        session.finish();
        session
    }

    #[test]
    fn loop_id_uses_four_decimals() {
        assert_eq!(loop_id(Coordinate::new(28.61390123, 77.20900456)), "loop_28.6139_77.2090");
        assert_eq!(loop_id(Coordinate::new(-33.8688, 151.2093)), "loop_-33.8688_151.2093");
    }

    #[test]
    fn loop_id_has_no_negative_zero() {
        assert_eq!(loop_id(Coordinate::new(-0.00001, 0.00002)), "loop_0.0000_0.0000");
        assert_eq!(loop_id(Coordinate::new(-0.0, -0.00004)), "loop_0.0000_0.0000");
        assert_eq!(loop_id(Coordinate::new(-0.00012, 0.)), "loop_-0.0001_0.0000");
    }

    #[test]
    fn builds_record_from_valid_loop() {
        let session = stopped_session(&[(28.61390123, 77.20900456), (28.6145, 77.2100), (28.6139, 77.2091)], 421);
        let record = RunRecordBuilder::default().build(&session, ADDRESS).unwrap();

        assert_eq!(record.loop_id(), "loop_28.6139_77.2090");
        assert_eq!(record.elapsed_seconds(), 421);
        assert_eq!(record.distance_meters(), session.total_distance_meters());
        assert_eq!(record.submitter_address(), ADDRESS);
    }

    #[test]
    fn same_start_same_loop_id() {
        let a = stopped_session(&[(10.00001, 20.00001), (10.001, 20.), (10., 20.)], 10);
        let b = stopped_session(&[(10.00002, 20.00002), (10., 20.002), (10., 20.)], 99);

        let builder = RunRecordBuilder::default();
        assert_eq!(
            builder.build(&a, ADDRESS).unwrap().loop_id(),
            builder.build(&b, ADDRESS).unwrap().loop_id()
        );
    }

    #[test]
    fn refuses_running_session() {
        let start = DateTime::from_timestamp(0, 0).unwrap();
        let mut session = RunSession::new();
        assert_eq!(
            RunRecordBuilder::default().build(&session, ADDRESS),
            Err(RecordError::NotStopped(RunState::Idle))
        );

        session.begin(start);
        assert_eq!(
            RunRecordBuilder::default().build(&session, ADDRESS),
            Err(RecordError::NotStopped(RunState::Tracking))
        );
    }

    #[test]
    fn refuses_short_paths() {
        let builder = RunRecordBuilder::default();
        assert_eq!(
            builder.build(&stopped_session(&[], 5), ADDRESS),
            Err(RecordError::LoopNotValidated { points: 0 })
        );
        assert_eq!(
            builder.build(&stopped_session(&[(0., 0.), (0., 0.)], 5), ADDRESS),
            Err(RecordError::LoopNotValidated { points: 2 })
        );
    }

    #[test]
    fn refuses_open_path() {
        let session = stopped_session(&[(28.6139, 77.2090), (28.6200, 77.2200), (28.6300, 77.2300)], 300);
        let Err(RecordError::LoopInvalid { closing_distance, threshold_meters }) =
            RunRecordBuilder::default().build(&session, ADDRESS)
        else {
            panic!("expected LoopInvalid");
        };

        assert!(closing_distance > 50.);
        assert_eq!(threshold_meters, 50.);
    }

    #[test]
    fn payload_decodes() {
        let session = stopped_session(&[(1., 1.), (1.0001, 1.), (1., 1.)], 12);
        let record = RunRecordBuilder::default().build(&session, ADDRESS).unwrap();

        let bytes = record.to_bytes().unwrap();
        assert_eq!(RunRecord::try_from(bytes.as_slice()), Ok(record.clone()));
        assert!(RunRecord::try_from(&bytes[..3]).is_err());

        let json: serde_json::Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert_eq!(json["loop_id"], "loop_1.0000_1.0000");
        assert_eq!(json["elapsed_seconds"], 12);
    }
}
