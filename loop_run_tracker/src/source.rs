use std::{path::Path, sync::Arc, time::Duration};

use loop_run_lib::{PositionError, PositionSample};
use parking_lot::Mutex;

use crate::{event::PositionSink, gpx_util, watch::WatchHandle, TrackerError};

/// A push-based stream of position fixes.
pub trait PositionSource: Send + Sync {
    /// Starts delivering into `sink` until the returned handle is released.
    fn watch(&self, sink: PositionSink) -> Result<WatchHandle, PositionError>;
}

/// A source driven from the outside, e.g. by a platform location callback.
/// Fixes pushed while nothing is watching are dropped.
#[derive(Debug, Default)]
pub struct PushSource {
    inner: Arc<Mutex<PushState>>,
}

#[derive(Debug, Default)]
struct PushState {
    sink: Option<PositionSink>,
    unavailable: Option<PositionError>,
    watch_count: usize,
}

impl PushSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, new watches fail with `error`.
    pub fn set_unavailable(&self, error: Option<PositionError>) {
        self.inner.lock().unavailable = error;
    }

    pub fn push(&self, sample: impl Into<PositionSample>) -> bool {
        let sink = self.inner.lock().sink.clone();
        sink.is_some_and(|sink| sink.sample(sample.into()))
    }

    pub fn push_error(&self, error: PositionError) -> bool {
        let sink = self.inner.lock().sink.clone();
        sink.is_some_and(|sink| sink.error(error))
    }

    pub fn is_watched(&self) -> bool {
        self.inner.lock().sink.is_some()
    }

    /// Number of successful watches so far.
    pub fn watch_count(&self) -> usize {
        self.inner.lock().watch_count
    }
}

impl PositionSource for PushSource {
    fn watch(&self, sink: PositionSink) -> Result<WatchHandle, PositionError> {
        let mut state = self.inner.lock();
        if let Some(error) = &state.unavailable {
            return Err(error.clone());
        }

        let generation = sink.generation();
        state.sink = Some(sink);
        state.watch_count += 1;

        let inner = self.inner.clone();
        Ok(WatchHandle::new(move || {
            let mut state = inner.lock();
            // A newer watch may already have replaced this one.
            if state.sink.as_ref().is_some_and(|sink| sink.generation() == generation) {
                state.sink = None;
            }
        }))
    }
}

/// Replays recorded fixes, one every `interval`.
#[derive(Debug, Clone)]
pub struct ReplaySource {
    samples: Arc<[PositionSample]>,
    interval: Duration,
}

impl ReplaySource {
    pub fn new(samples: Vec<PositionSample>, interval: Duration) -> Self {
        Self {
            samples: samples.into(),
            interval,
        }
    }

    pub fn from_gpx(path: &Path, interval: Duration) -> Result<Self, TrackerError> {
        Ok(Self::new(gpx_util::read_gpx_file(path)?, interval))
    }

    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl PositionSource for ReplaySource {
    fn watch(&self, sink: PositionSink) -> Result<WatchHandle, PositionError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| PositionError::Unavailable("replay needs a tokio runtime".into()))?;

        let samples = self.samples.clone();
        let interval = self.interval;
        let task = runtime.spawn(async move {
            for sample in samples.iter() {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                if !sink.sample(*sample) {
                    break;
                }
            }
            tracing::debug!("Replay of {} samples finished", samples.len());
        });

        Ok(WatchHandle::from_task(task))
    }
}

#[cfg(test)]
mod tests {
    use loop_run_lib::Coordinate;

    use super::*;
    use crate::event::{event_channel, PositionEvent, TrackerEvent};

    #[test]
    fn push_source_delivers_only_while_watched() {
        let source = PushSource::new();
        let (tx, mut rx) = event_channel();

        assert!(!source.push(Coordinate::new(1., 1.)));

        let mut handle = source.watch(PositionSink::new(7, tx)).unwrap();
        assert!(source.is_watched());
        assert!(source.push(Coordinate::new(2., 2.)));
        assert!(source.push_error(PositionError::Timeout));

        handle.release();
        assert!(!source.is_watched());
        assert!(!source.push(Coordinate::new(3., 3.)));

        assert_eq!(
            rx.try_recv().unwrap(),
            TrackerEvent::Position {
                generation: 7,
                event: PositionEvent::Sample(PositionSample::new(Coordinate::new(2., 2.))),
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            TrackerEvent::Position {
                generation: 7,
                event: PositionEvent::Error(PositionError::Timeout),
            }
        );
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn releasing_old_watch_keeps_newer_one() {
        let source = PushSource::new();
        let (tx, _rx) = event_channel();

        let mut first = source.watch(PositionSink::new(1, tx.clone())).unwrap();
        let _second = source.watch(PositionSink::new(2, tx)).unwrap();
        first.release();

        assert!(source.is_watched());
        assert_eq!(source.watch_count(), 2);
    }

    #[test]
    fn unavailable_source_refuses_watch() {
        let source = PushSource::new();
        source.set_unavailable(Some(PositionError::PermissionDenied));
        let (tx, _rx) = event_channel();

        assert_eq!(
            source.watch(PositionSink::new(1, tx)).unwrap_err(),
            PositionError::PermissionDenied
        );
        assert_eq!(source.watch_count(), 0);
    }

    #[test]
    fn replay_without_runtime_is_unavailable() {
        let source = ReplaySource::new(vec![], Duration::ZERO);
        let (tx, _rx) = event_channel();
        assert!(matches!(
            source.watch(PositionSink::new(1, tx)),
            Err(PositionError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_sends_samples_in_order() {
        let samples: Vec<PositionSample> = (0..3)
            .map(|i| PositionSample::new(Coordinate::new(i as f64, 0.)))
            .collect();
        let source = ReplaySource::new(samples.clone(), Duration::from_secs(1));
        let (tx, mut rx) = event_channel();

        let _handle = source.watch(PositionSink::new(3, tx)).unwrap();

        for expected in samples {
            let event = rx.recv().await.unwrap();
            assert_eq!(
                event,
                TrackerEvent::Position {
                    generation: 3,
                    event: PositionEvent::Sample(expected),
                }
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn released_replay_stops_sending() {
        let samples = vec![PositionSample::new(Coordinate::new(0., 0.)); 10];
        let source = ReplaySource::new(samples, Duration::from_secs(1));
        let (tx, mut rx) = event_channel();

        let mut handle = source.watch(PositionSink::new(1, tx)).unwrap();
        assert!(rx.recv().await.is_some());
        handle.release();

        // The replay task owned the only sender, so the channel closes.
        assert!(rx.recv().await.is_none());
    }
}
