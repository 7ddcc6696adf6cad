use loop_run_lib::{PositionError, PositionSample};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, PartialEq)]
pub enum PositionEvent {
    Sample(PositionSample),
    Error(PositionError),
}

/// Something that happened to a run. `generation` names the run it belongs to,
/// so events still queued from a replaced run can be told apart.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    Position { generation: u64, event: PositionEvent },
    Tick { generation: u64 },
}

pub type EventSender = UnboundedSender<TrackerEvent>;
pub type EventReceiver = UnboundedReceiver<TrackerEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::unbounded_channel()
}

/// Where a position source delivers its fixes.
#[derive(Debug, Clone)]
pub struct PositionSink {
    generation: u64,
    events: EventSender,
}

impl PositionSink {
    pub fn new(generation: u64, events: EventSender) -> Self {
        Self { generation, events }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns false once nobody is listening anymore.
    pub fn sample(&self, sample: PositionSample) -> bool {
        self.send(PositionEvent::Sample(sample))
    }

    pub fn error(&self, error: PositionError) -> bool {
        self.send(PositionEvent::Error(error))
    }

    pub fn is_closed(&self) -> bool {
        self.events.is_closed()
    }

    fn send(&self, event: PositionEvent) -> bool {
        self.events
            .send(TrackerEvent::Position {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

#[derive(Debug, Clone)]
pub struct TickSink {
    generation: u64,
    events: EventSender,
}

impl TickSink {
    pub fn new(generation: u64, events: EventSender) -> Self {
        Self { generation, events }
    }

    pub fn tick(&self) -> bool {
        self.events
            .send(TrackerEvent::Tick {
                generation: self.generation,
            })
            .is_ok()
    }
}
