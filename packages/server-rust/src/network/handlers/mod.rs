//! HTTP handler definitions for the function server.
//!
//! This module defines `AppState` (the shared state carried through axum
//! extractors) and re-exports all handler functions for convenient access
//! when building the router.

pub mod health;
pub mod invoke;

pub use health::healthz_handler;
pub use invoke::invoke_handler;

use std::sync::Arc;

use tokio::sync::Semaphore;

use super::ShutdownController;
use crate::health::HealthMonitor;
use crate::invoke::{Executor, Handler};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The handler resolved at startup.
    pub handler: Arc<dyn Handler>,
    /// Runs invocations and reports stuck workers to `health`.
    pub executor: Arc<Executor>,
    /// Liveness flag read by `/healthz`.
    pub health: Arc<HealthMonitor>,
    /// Graceful shutdown controller with in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Single permit: invocations run one at a time.
    pub gate: Arc<Semaphore>,
}

impl AppState {
    /// Builds the state for `handler` with a fresh, healthy monitor.
    #[must_use]
    pub fn new(handler: Arc<dyn Handler>, shutdown: Arc<ShutdownController>) -> Self {
        let health = Arc::new(HealthMonitor::new());
        Self {
            handler,
            executor: Arc::new(Executor::new(Arc::clone(&health))),
            health,
            shutdown,
            gate: Arc::new(Semaphore::new(1)),
        }
    }
}
