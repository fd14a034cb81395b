//! Shutdown and pause flags shared by every worker of a machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;

struct ControlInner {
    shutdown: watch::Sender<bool>,
    paused: AtomicBool,
}

/// Coordination object owned by the machine and cloned into each worker.
///
/// Shutdown is monotonic: once requested it is never cleared. Pause can be
/// toggled freely.
#[derive(Clone)]
pub struct WorkerControl {
    inner: Arc<ControlInner>,
}

impl WorkerControl {
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlInner {
                shutdown,
                paused: AtomicBool::new(false),
            }),
        }
    }

    /// Ask every worker to stop at its next reserving step.
    ///
    /// Returns `true` the first time it is called.
    pub fn request_shutdown(&self) -> bool {
        !self.inner.shutdown.send_replace(true)
    }

    pub fn is_shutdown_requested(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    /// Resolves once shutdown has been requested.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.inner.shutdown.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }

    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for WorkerControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerControl")
            .field("shutdown", &self.is_shutdown_requested())
            .field("paused", &self.is_paused())
            .finish()
    }
}
