//! Dedicated, cancellable worker for a single handler call.
//!
//! The job runs on its own OS thread so the caller can race it against a
//! deadline. Cancellation is cooperative at exactly one point: a job that has
//! not started yet can be cancelled, a job that is already running cannot.
//! A running job that is abandoned keeps its thread until it returns; the
//! thread is detached and never blocks process exit.

use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::oneshot;

const PENDING: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const CANCELLED: u8 = 3;

/// Why a worker produced no value.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("{0}")]
    Panicked(String),
    #[error("worker was cancelled before it started")]
    Cancelled,
    #[error("worker exited without reporting a result")]
    Lost,
}

/// Handle to a job running (or about to run) on a dedicated thread.
#[derive(Debug)]
pub struct WorkerTask<T> {
    state: Arc<AtomicU8>,
    result: oneshot::Receiver<thread::Result<T>>,
}

/// The runnable half of a [`WorkerTask`].
pub struct Job<T> {
    state: Arc<AtomicU8>,
    tx: oneshot::Sender<thread::Result<T>>,
    work: Box<dyn FnOnce() -> T + Send>,
}

impl<T: Send + 'static> WorkerTask<T> {
    /// Prepares `work` without running it.
    pub fn new<F>(work: F) -> (Self, Job<T>)
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(PENDING));
        let (tx, rx) = oneshot::channel();
        let task = Self {
            state: Arc::clone(&state),
            result: rx,
        };
        let job = Job {
            state,
            tx,
            work: Box::new(work),
        };
        (task, job)
    }

    /// Runs `work` on a new thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn<F>(name: &str, work: F) -> io::Result<Self>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (task, job) = Self::new(work);
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || job.run())?;
        Ok(task)
    }

    /// Attempts to cancel the job.
    ///
    /// Returns `true` if the job had not started and now never will.
    /// Returns `false` if it is already running or has finished.
    pub fn cancel(&self) -> bool {
        match self
            .state
            .compare_exchange(PENDING, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(current) => current == CANCELLED,
        }
    }

    /// Whether the job has begun executing and not yet returned.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.load(Ordering::Acquire) == RUNNING
    }

    /// Waits for the job's value.
    ///
    /// Cancel-safe: dropping the future leaves the task intact.
    ///
    /// # Errors
    ///
    /// Returns `WorkerError::Panicked` with the panic message if the job
    /// panicked, `Cancelled` if it was cancelled, or `Lost` if the job was
    /// dropped without running.
    pub async fn join(&mut self) -> Result<T, WorkerError> {
        match (&mut self.result).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(payload)) => Err(WorkerError::Panicked(panic_message(payload.as_ref()))),
            Err(_) if self.state.load(Ordering::Acquire) == CANCELLED => {
                Err(WorkerError::Cancelled)
            }
            Err(_) => Err(WorkerError::Lost),
        }
    }
}

impl<T> Job<T> {
    /// Runs the job on the current thread unless it was cancelled first.
    pub fn run(self) {
        if self
            .state
            .compare_exchange(PENDING, RUNNING, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let outcome = panic::catch_unwind(AssertUnwindSafe(self.work));
        self.state.store(FINISHED, Ordering::Release);
        // The receiver is gone when the caller stopped waiting.
        let _ = self.tx.send(outcome);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
