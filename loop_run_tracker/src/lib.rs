use const_format::concatcp;
use loop_run_lib::{PositionError, RecordError};
use thiserror::Error;

pub mod clock;
pub mod config;
pub mod event;
pub mod gpx_util;
pub mod ledger;
pub mod service;
pub mod source;
pub mod ticker;
pub mod tracker;
pub mod watch;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, TrackerConfig};
pub use ledger::{ContestLedger, ContestRecord, RunSubmitter, SubmissionError, SubmissionReceipt};
pub use service::{TrackerHandle, TrackerService};
pub use source::{PositionSource, PushSource, ReplaySource};
pub use ticker::{IntervalTicker, NoTicker, TickSource};
pub use tracker::RunTracker;
pub use watch::WatchHandle;

pub const CONFIG_DIR: &str = "config/";
pub const DEFAULT_CONFIG_PATH: &str = concatcp!(CONFIG_DIR, "loop_run.conf");

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("tracker service has stopped")]
    ServiceStopped,
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error(transparent)]
    Submission(#[from] SubmissionError),
    #[error("gpx: {0}")]
    Gpx(String),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
