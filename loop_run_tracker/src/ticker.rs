use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::{event::TickSink, watch::WatchHandle};

pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Periodic wake-ups that keep the elapsed time of a run current.
pub trait TickSource: Send + Sync {
    fn schedule(&self, sink: TickSink) -> WatchHandle;
}

#[derive(Debug, Clone, Copy)]
pub struct IntervalTicker {
    period: Duration,
}

impl Default for IntervalTicker {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl IntervalTicker {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}

impl TickSource for IntervalTicker {
    fn schedule(&self, sink: TickSink) -> WatchHandle {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("No tokio runtime, elapsed time will only update on stop");
            return WatchHandle::inactive();
        };

        let period = self.period.max(Duration::from_millis(1));
        let task = runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            interval.tick().await;

            loop {
                interval.tick().await;
                if !sink.tick() {
                    break;
                }
            }
        });

        WatchHandle::from_task(task)
    }
}

/// Never ticks. Elapsed time is then only refreshed by explicit `tick()` calls
/// and on stop.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTicker;

impl TickSource for NoTicker {
    fn schedule(&self, _sink: TickSink) -> WatchHandle {
        WatchHandle::inactive()
    }
}
