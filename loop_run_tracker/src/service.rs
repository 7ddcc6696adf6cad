use std::sync::Arc;

use loop_run_lib::{LoopValidator, PositionError, RecordError, RunRecord, RunSnapshot, StopReport};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    clock::Clock,
    event::{event_channel, EventReceiver},
    ledger::{RunSubmitter, SubmissionReceipt},
    source::PositionSource,
    ticker::TickSource,
    tracker::RunTracker,
    TrackerError,
};

const COMMAND_QUEUE_SIZE: usize = 32;

enum Command {
    Start(oneshot::Sender<Result<RunSnapshot, PositionError>>),
    Stop(oneshot::Sender<Option<StopReport>>),
    BuildRecord {
        submitter_address: String,
        reply: oneshot::Sender<Result<RunRecord, RecordError>>,
    },
}

/// Runs a `RunTracker` on its own task. Commands, position fixes and ticks are
/// all applied there one at a time, so the session has a single writer.
pub struct TrackerService {
    tracker: RunTracker,
    events: EventReceiver,
    commands: mpsc::Receiver<Command>,
    snapshots: watch::Sender<RunSnapshot>,
}

impl TrackerService {
    /// Spawns the service on the current tokio runtime. It shuts down, releasing
    /// any live subscriptions, once every handle is dropped.
    pub fn spawn(
        clock: Arc<dyn Clock>,
        positions: Arc<dyn PositionSource>,
        ticker: Arc<dyn TickSource>,
        validator: LoopValidator,
    ) -> TrackerHandle {
        let (event_tx, events) = event_channel();
        let (command_tx, commands) = mpsc::channel(COMMAND_QUEUE_SIZE);

        let tracker = RunTracker::new(clock, positions, ticker, event_tx).with_validator(validator);
        let (snapshots, snapshot_rx) = watch::channel(tracker.snapshot());

        let service = TrackerService {
            tracker,
            events,
            commands,
            snapshots,
        };
        tokio::spawn(service.run());

        TrackerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
        }
    }

    async fn run(mut self) {
        tracing::debug!("Tracker service running");

        loop {
            tokio::select! {
                biased;

                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command);
                }
                Some(event) = self.events.recv() => {
                    if self.tracker.handle_event(event) {
                        self.publish();
                    }
                }
            }
        }

        tracing::debug!("Tracker service stopped");
    }

    fn handle_command(&mut self, command: Command) {
        // Fixes queued before the command arrived belong to the run it acts on.
        if self.drain_events() {
            self.publish();
        }

        // Snapshots go out before the reply so callers never see a stale one.
        // A dropped reply receiver only means the caller stopped waiting.
        match command {
            Command::Start(reply) => {
                let result = self.tracker.start().map(|_| self.tracker.snapshot());
                self.publish();
                let _ = reply.send(result);
            }
            Command::Stop(reply) => {
                let report = self.tracker.stop();
                self.publish();
                let _ = reply.send(report);
            }
            Command::BuildRecord {
                submitter_address,
                reply,
            } => {
                let _ = reply.send(self.tracker.build_record(submitter_address));
            }
        }
    }

    /// Applies every event already queued. Returns whether anything changed.
    fn drain_events(&mut self) -> bool {
        let mut changed = false;
        while let Ok(event) = self.events.try_recv() {
            changed |= self.tracker.handle_event(event);
        }
        changed
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.tracker.snapshot());
    }
}

/// Cheap to clone. Every clone talks to the same service.
#[derive(Clone)]
pub struct TrackerHandle {
    commands: mpsc::Sender<Command>,
    snapshots: watch::Receiver<RunSnapshot>,
}

impl TrackerHandle {
    pub async fn start_run(&self) -> Result<RunSnapshot, TrackerError> {
        Ok(self.request(Command::Start).await??)
    }

    /// `None` if no run was going.
    pub async fn stop_run(&self) -> Result<Option<StopReport>, TrackerError> {
        self.request(Command::Stop).await
    }

    pub async fn build_record(&self, submitter_address: impl Into<String>) -> Result<RunRecord, TrackerError> {
        let submitter_address = submitter_address.into();
        Ok(self
            .request(|reply| Command::BuildRecord {
                submitter_address,
                reply,
            })
            .await??)
    }

    /// Builds the record of the stopped run and hands it to `submitter`. The
    /// submission runs on the caller's task and is not retried.
    pub async fn submit(
        &self,
        submitter_address: impl Into<String>,
        submitter: &dyn RunSubmitter,
    ) -> Result<(RunRecord, SubmissionReceipt), TrackerError> {
        let record = self.build_record(submitter_address).await?;

        match submitter.submit(&record).await {
            Ok(receipt) => {
                tracing::info!("Submitted {}: {receipt}", record.loop_id());
                Ok((record, receipt))
            }
            Err(err) => {
                tracing::error!("Submission of {} failed: {err}", record.loop_id());
                Err(err.into())
            }
        }
    }

    /// The latest published snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receives a new snapshot after every change.
    pub fn snapshots(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.clone()
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T, TrackerError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(command(reply))
            .await
            .map_err(|_| TrackerError::ServiceStopped)?;
        response.await.map_err(|_| TrackerError::ServiceStopped)
    }
}
