//! Process-wide liveness flag.
//!
//! Starts healthy and flips to unhealthy only when a timed-out invocation
//! could not be stopped. There is no way back: an orchestrator is expected to
//! restart the process.

use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug)]
pub struct HealthMonitor {
    healthy: AtomicBool,
}

impl HealthMonitor {
    /// Creates a monitor in the healthy state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
        }
    }

    /// Marks the process permanently unhealthy. Idempotent.
    ///
    /// Returns `true` if this call performed the transition.
    pub fn mark_unhealthy(&self) -> bool {
        self.healthy.swap(false, Ordering::AcqRel)
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Acquire)
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}
