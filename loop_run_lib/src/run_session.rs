use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{coordinate::Coordinate, geo::DistanceAccumulator, status::RunStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RunState {
    #[default]
    Idle,
    Tracking,
    Stopped,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Idle => write!(f, "idle"),
            RunState::Tracking => write!(f, "tracking"),
            RunState::Stopped => write!(f, "stopped"),
        }
    }
}

/// One start-to-stop run. The path and its distance only ever change together,
/// and only while tracking.
#[derive(Debug, Clone, Default)]
pub struct RunSession {
    state: RunState,
    start_time: Option<DateTime<Utc>>,
    elapsed_seconds: u64,
    path: Vec<Coordinate>,
    distance: DistanceAccumulator,
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throws away whatever the session held and starts tracking from `start_time`.
    pub fn begin(&mut self, start_time: DateTime<Utc>) {
        self.path.clear();
        self.distance.reset();
        self.elapsed_seconds = 0;
        self.start_time = Some(start_time);
        self.state = RunState::Tracking;
    }

    /// Appends a sample. Returns false (and changes nothing) unless tracking.
    pub fn record(&mut self, coordinate: Coordinate) -> bool {
        if self.state != RunState::Tracking {
            return false;
        }

        self.distance.update(coordinate);
        self.path.push(coordinate);
        true
    }

    pub fn update_elapsed(&mut self, now: DateTime<Utc>) -> u64 {
        if self.state != RunState::Tracking {
            return self.elapsed_seconds;
        }

        if let Some(start_time) = self.start_time {
            self.elapsed_seconds = (now - start_time).num_seconds().max(0) as u64;
        }
        self.elapsed_seconds
    }

    /// Freezes the session. Returns false if it was not tracking.
    pub fn finish(&mut self) -> bool {
        if self.state != RunState::Tracking {
            return false;
        }

        self.state = RunState::Stopped;
        true
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds
    }

    pub fn path(&self) -> &[Coordinate] {
        &self.path
    }

    pub fn total_distance_meters(&self) -> f64 {
        self.distance.total_meters()
    }

    pub fn current_position(&self) -> Option<Coordinate> {
        self.path.last().copied()
    }

    pub fn snapshot(&self, status: Option<RunStatus>) -> RunSnapshot {
        RunSnapshot {
            state: self.state,
            start_time: self.start_time,
            elapsed_seconds: self.elapsed_seconds,
            current_position: self.current_position(),
            path: self.path.clone(),
            total_distance_meters: self.total_distance_meters(),
            status,
        }
    }
}

/// Read-only copy of a session handed to display collaborators.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RunSnapshot {
    pub state: RunState,
    pub start_time: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub current_position: Option<Coordinate>,
    pub path: Vec<Coordinate>,
    pub total_distance_meters: f64,
    pub status: Option<RunStatus>,
}
