//! Shutdown signalling and in-flight invocation accounting.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

/// Broadcasts the stop request and counts invocations that have not
/// finished yet.
///
/// The serve loop flips the flag when the process is asked to stop; the
/// invocation endpoint holds an [`InvocationGuard`] for each request so the
/// drain step can report what was abandoned.
#[derive(Debug)]
pub struct ShutdownController {
    stopping: watch::Sender<bool>,
    in_flight: Arc<AtomicUsize>,
}

impl ShutdownController {
    #[must_use]
    pub fn new() -> Self {
        let (stopping, _) = watch::channel(false);
        Self {
            stopping,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Subscribes to the stop flag.
    #[must_use]
    pub fn shutdown_receiver(&self) -> watch::Receiver<bool> {
        self.stopping.subscribe()
    }

    /// Requests shutdown. Calling it again has no further effect.
    pub fn trigger_shutdown(&self) {
        self.stopping.send_replace(true);
    }

    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        *self.stopping.borrow()
    }

    /// Counts one invocation until the returned guard is dropped.
    #[must_use]
    pub fn track_invocation(&self) -> InvocationGuard {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InvocationGuard {
            in_flight: Arc::clone(&self.in_flight),
        }
    }

    /// Invocations accepted but not yet answered.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

/// Held for the lifetime of one invocation request.
#[derive(Debug)]
pub struct InvocationGuard {
    in_flight: Arc<AtomicUsize>,
}

impl Drop for InvocationGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
    }
}
