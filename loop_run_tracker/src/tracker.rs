use std::sync::Arc;

use loop_run_lib::{
    Coordinate, LoopValidator, PositionError, RecordError, RunRecord, RunRecordBuilder, RunSession, RunSnapshot,
    RunState, RunStatus, StopReport,
};

use crate::{
    clock::Clock,
    event::{EventSender, PositionEvent, PositionSink, TickSink, TrackerEvent},
    source::PositionSource,
    ticker::TickSource,
    watch::WatchHandle,
};

/// The run state machine: Idle -> Tracking -> Stopped, and back to Tracking on
/// every `start`. Owns the one live session. It is not synchronized, so all
/// calls must come from a single writer (see `TrackerService`).
pub struct RunTracker {
    session: RunSession,
    status: Option<RunStatus>,
    generation: u64,
    validator: LoopValidator,

    clock: Arc<dyn Clock>,
    positions: Arc<dyn PositionSource>,
    ticker: Arc<dyn TickSource>,
    events: EventSender,

    position_watch: Option<WatchHandle>,
    tick_watch: Option<WatchHandle>,
}

impl RunTracker {
    /// Sources deliver into `events`; whoever drains the matching receiver
    /// feeds the events back through `handle_event`.
    pub fn new(
        clock: Arc<dyn Clock>,
        positions: Arc<dyn PositionSource>,
        ticker: Arc<dyn TickSource>,
        events: EventSender,
    ) -> Self {
        Self {
            session: RunSession::new(),
            status: None,
            generation: 0,
            validator: LoopValidator::default(),
            clock,
            positions,
            ticker,
            events,
            position_watch: None,
            tick_watch: None,
        }
    }

    pub fn with_validator(mut self, validator: LoopValidator) -> Self {
        self.validator = validator;
        self
    }

    /// Starts a fresh run, discarding whatever the previous one held.
    ///
    /// Live subscriptions are released before the new one is requested, so
    /// single-watcher sources can be restarted. If the position source refuses
    /// the subscription the error is reported as status and returned, and the
    /// previous session data is left as it was without a live subscription.
    pub fn start(&mut self) -> Result<(), PositionError> {
        self.release_watches();

        let generation = self.generation + 1;
        let position_watch = match self.positions.watch(PositionSink::new(generation, self.events.clone())) {
            Ok(watch) => watch,
            Err(err) => {
                tracing::warn!("Could not start run, position unavailable: {err}");
                self.status = Some(RunStatus::PositionUnavailable(err.clone()));
                return Err(err);
            }
        };

        if self.session.state() == RunState::Tracking {
            tracing::info!(
                "Discarding unfinished run with {} points",
                self.session.path().len()
            );
        }

        self.generation = generation;
        self.session.begin(self.clock.now());
        self.position_watch = Some(position_watch);
        self.tick_watch = Some(self.ticker.schedule(TickSink::new(generation, self.events.clone())));
        self.status = Some(RunStatus::Started);

        tracing::info!("Run {} started", self.generation);
        Ok(())
    }

    /// Returns whether the sample was taken. Anything outside a run is dropped.
    pub fn on_sample(&mut self, coordinate: Coordinate) -> bool {
        let recorded = self.session.record(coordinate);
        if !recorded {
            tracing::debug!("Ignoring sample while {}", self.session.state());
        }
        recorded
    }

    /// Position errors never end a run; the source may recover.
    pub fn on_sample_error(&mut self, error: PositionError) {
        tracing::warn!("Position error: {error}");
        // Keep the loop verdict of a stopped run on display.
        if self.session.state() != RunState::Stopped {
            self.status = Some(RunStatus::PositionUnavailable(error));
        }
    }

    pub fn tick(&mut self) -> u64 {
        self.session.update_elapsed(self.clock.now())
    }

    /// Ends the run and judges the loop. Returns `None` if no run was going.
    pub fn stop(&mut self) -> Option<StopReport> {
        if self.session.state() != RunState::Tracking {
            tracing::debug!("Stop while {}, nothing to do", self.session.state());
            return None;
        }

        self.session.update_elapsed(self.clock.now());
        self.release_watches();
        self.session.finish();

        let report = StopReport {
            outcome: self.validator.evaluate(self.session.path()),
            elapsed_seconds: self.session.elapsed_seconds(),
            total_distance_meters: self.session.total_distance_meters(),
            threshold_meters: self.validator.threshold_meters(),
        };
        tracing::info!("Run {} stopped: {report}", self.generation);

        self.status = Some(RunStatus::Finished(report));
        Some(report)
    }

    /// Applies a queued event. Events from an earlier run are dropped.
    /// Returns whether anything visible changed.
    pub fn handle_event(&mut self, event: TrackerEvent) -> bool {
        match event {
            TrackerEvent::Position { generation, event } if generation == self.generation => match event {
                PositionEvent::Sample(sample) => self.on_sample(sample.coordinate),
                PositionEvent::Error(error) => {
                    self.on_sample_error(error);
                    true
                }
            },
            TrackerEvent::Tick { generation } if generation == self.generation => {
                let before = self.session.elapsed_seconds();
                self.tick() != before
            }
            stale => {
                tracing::trace!("Dropping stale event {stale:?}");
                false
            }
        }
    }

    pub fn build_record(&self, submitter_address: impl Into<String>) -> Result<RunRecord, RecordError> {
        RunRecordBuilder::new(self.validator).build(&self.session, submitter_address)
    }

    pub fn snapshot(&self) -> RunSnapshot {
        self.session.snapshot(self.status.clone())
    }

    pub fn session(&self) -> &RunSession {
        &self.session
    }

    pub fn state(&self) -> RunState {
        self.session.state()
    }

    pub fn status(&self) -> Option<&RunStatus> {
        self.status.as_ref()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn release_watches(&mut self) {
        if let Some(mut watch) = self.position_watch.take() {
            watch.release();
        }
        if let Some(mut watch) = self.tick_watch.take() {
            watch.release();
        }
    }
}
