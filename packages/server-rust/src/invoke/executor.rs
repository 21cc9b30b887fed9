//! Invocation executor: runs a handler under capture and an optional deadline.
//!
//! Each call is dispatched to a dedicated [`WorkerTask`] and raced against the
//! deadline. The handler's result is converted to JSON on the worker too, so
//! a panicking `Serialize` impl is caught like any other handler panic.
//! Every exit path (success, handler failure, panic, timeout) ends with the
//! capture sealed and a classified [`Invocation`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::anyhow;
use fnserver_core::{encode, Cause, ContextMap, Encoded, Fault, ToPayload};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::capture::{CapturedOutput, OutputCapture};
use super::handler::{Handler, HandlerError, InvocationContext};
use super::worker::{WorkerError, WorkerTask};
use crate::health::HealthMonitor;

/// Thread name of the per-invocation worker.
pub const WORKER_THREAD_NAME: &str = "invocation-worker";

type HandlerOutcome = Result<Result<Value, serde_json::Error>, HandlerError>;

// ---------------------------------------------------------------------------
// Invocation
// ---------------------------------------------------------------------------

/// Outcome of one invocation: the result or the classified error, plus the
/// captured output.
///
/// When `error` is set, `stderr` ends with the error's trace lines.
pub struct Invocation {
    pub result: Option<Value>,
    pub error: Option<Fault>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

impl Invocation {
    /// An invocation refused before the handler ran.
    #[must_use]
    pub fn rejected(fault: Fault) -> Self {
        Self {
            result: None,
            stdout: Vec::new(),
            stderr: fault.stacktrace().to_vec(),
            error: Some(fault),
        }
    }

    fn completed(outcome: Result<Value, Fault>, captured: CapturedOutput) -> Self {
        let CapturedOutput { stdout, mut stderr } = captured;
        match outcome {
            Ok(value) => Self {
                result: Some(value),
                error: None,
                stdout,
                stderr,
            },
            Err(fault) => {
                stderr.extend_from_slice(fault.stacktrace());
                Self {
                    result: None,
                    error: Some(fault),
                    stdout,
                    stderr,
                }
            }
        }
    }

    /// Encodes the response envelope for this invocation.
    #[must_use]
    pub fn encode(self) -> Encoded {
        let result = self.result.as_ref().map(|value| value as &dyn ToPayload);
        encode(result, self.error, self.stdout, self.stderr)
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Runs handlers and reports uncancellable timeouts to the [`HealthMonitor`].
#[derive(Debug)]
pub struct Executor {
    health: Arc<HealthMonitor>,
}

impl Executor {
    #[must_use]
    pub fn new(health: Arc<HealthMonitor>) -> Self {
        Self { health }
    }

    #[must_use]
    pub fn health(&self) -> &Arc<HealthMonitor> {
        &self.health
    }

    /// Calls `handler` with `context` and `payload`.
    ///
    /// `timeout_ms` of `None` or `Some(0)` waits until the handler returns.
    /// Otherwise the wait is bounded; on expiry the worker is cancelled if it
    /// has not started, and the process is marked unhealthy if it is still
    /// running.
    pub async fn execute(
        &self,
        handler: Arc<dyn Handler>,
        context: Option<ContextMap>,
        payload: Value,
        timeout_ms: Option<u64>,
    ) -> Invocation {
        let started = Instant::now();
        let capture = OutputCapture::begin();
        let mut ctx = InvocationContext::new(context, capture.stdout(), capture.stderr());

        let outcome = match WorkerTask::spawn(WORKER_THREAD_NAME, move || {
            handler
                .call(&mut ctx, payload)
                .map(|reply| reply.to_payload())
        }) {
            Ok(task) => self.wait(task, timeout_ms).await,
            Err(err) => Err(Fault::from_error(
                Cause::WorkerUnavailable,
                &anyhow::Error::new(err).context("failed to start invocation worker"),
            )),
        };

        let captured = capture.finish();
        match &outcome {
            Ok(_) => debug!(elapsed = ?started.elapsed(), "invocation succeeded"),
            Err(fault) => debug!(
                elapsed = ?started.elapsed(),
                kind = %fault.kind(),
                message = fault.message(),
                "invocation failed"
            ),
        }
        Invocation::completed(outcome, captured)
    }

    async fn wait(
        &self,
        mut task: WorkerTask<HandlerOutcome>,
        timeout_ms: Option<u64>,
    ) -> Result<Value, Fault> {
        let joined = match timeout_ms.filter(|ms| *ms > 0) {
            None => task.join().await,
            Some(ms) => {
                let waited = tokio::time::timeout(Duration::from_millis(ms), task.join()).await;
                match waited {
                    Ok(joined) => joined,
                    Err(_elapsed) => return Err(self.deadline_exceeded(&task, ms)),
                }
            }
        };

        match joined {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(err))) => Err(Fault::from_serialize_error(err)),
            Ok(Err(HandlerError::InvalidInput(message))) => {
                Err(Fault::from_error(Cause::InvalidInput, &anyhow!(message)))
            }
            Ok(Err(HandlerError::Failed(err))) => {
                Err(Fault::from_error(Cause::HandlerFailed, &err))
            }
            Err(WorkerError::Panicked(message)) => {
                let trace = vec![format!("thread '{WORKER_THREAD_NAME}' panicked: {message}")];
                Err(Fault::new(Cause::HandlerPanicked, message, trace))
            }
            Err(err @ (WorkerError::Cancelled | WorkerError::Lost)) => Err(Fault::from_error(
                Cause::WorkerUnavailable,
                &anyhow::Error::new(err),
            )),
        }
    }

    fn deadline_exceeded(&self, task: &WorkerTask<HandlerOutcome>, timeout_ms: u64) -> Fault {
        if task.cancel() {
            info!(timeout_ms, "invocation timed out before its worker started; cancelled");
        } else if task.is_running() {
            self.health.mark_unhealthy();
            warn!(
                timeout_ms,
                "invocation timed out and its worker cannot be stopped; process is now unhealthy"
            );
        } else {
            info!(timeout_ms, "invocation timed out as its worker finished; nothing leaked");
        }
        Fault::from_error(
            Cause::DeadlineExceeded,
            &anyhow!("invocation timed out after {timeout_ms}ms"),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
