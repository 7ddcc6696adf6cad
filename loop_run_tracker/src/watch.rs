use std::fmt;

use tokio::task::JoinHandle;

/// Keeps a subscription alive. Releasing is idempotent and also happens on drop,
/// so a handle can't outlive the run that acquired it.
pub struct WatchHandle {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchHandle {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Aborts `task` on release.
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    /// A handle with nothing to release.
    pub fn inactive() -> Self {
        Self { release: None }
    }

    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    pub fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WatchHandle {{ active: {} }}", self.is_active())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn releases_exactly_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        let mut handle = WatchHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handle.is_active());
        handle.release();
        handle.release();
        drop(handle);

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = released.clone();
        drop(WatchHandle::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn release_aborts_task() {
        let (alive, dropped) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _alive = alive;
            std::future::pending::<()>().await
        });

        let mut handle = WatchHandle::from_task(task);
        handle.release();

        // The sender is dropped together with the aborted task.
        assert!(dropped.await.is_err());
        assert!(!WatchHandle::inactive().is_active());
    }
}
