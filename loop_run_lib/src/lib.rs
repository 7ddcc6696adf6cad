pub mod coordinate;
pub mod geo;
pub mod loop_validator;
pub mod position;
pub mod run_record;
pub mod run_session;
pub mod status;

pub use coordinate::Coordinate;
pub use geo::{haversine_distance, DistanceAccumulator, EARTH_RADIUS_METERS};
pub use loop_validator::{evaluate, LoopOutcome, LoopValidator, CLOSURE_THRESHOLD_METERS};
pub use position::{PositionError, PositionSample};
pub use run_record::{loop_id, RecordError, RunRecord, RunRecordBuilder};
pub use run_session::{RunSession, RunSnapshot, RunState};
pub use status::{format_elapsed, RunStatus, StopReport};
