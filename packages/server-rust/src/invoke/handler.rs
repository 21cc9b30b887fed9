//! Handler calling convention.
//!
//! A handler is called with an [`InvocationContext`] (the request context plus
//! invocation-scoped output writers) and the request payload.

use std::fmt;
use std::io;

use fnserver_core::{ContextMap, ToPayload};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::capture::LogWriter;

/// A handler's successful result, serialized when the response is encoded.
pub type Reply = Box<dyn ToPayload>;

/// Errors a handler may return.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// The payload or context has the wrong shape or type. Reported as
    /// `InputError`.
    #[error("{0}")]
    InvalidInput(String),
    /// Any other failure. Reported as `FunctionError`.
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn invalid_input(message: impl fmt::Display) -> Self {
        Self::InvalidInput(message.to_string())
    }
}

impl From<io::Error> for HandlerError {
    fn from(err: io::Error) -> Self {
        Self::Failed(err.into())
    }
}

/// Deserializes the payload into `T`, reporting a mismatch as invalid input.
///
/// # Errors
///
/// Returns `HandlerError::InvalidInput` when the payload does not match `T`.
pub fn parse_payload<T: DeserializeOwned>(payload: Value) -> Result<T, HandlerError> {
    serde_json::from_value(payload)
        .map_err(|err| HandlerError::invalid_input(format!("invalid payload: {err}")))
}

/// Per-invocation view handed to the handler.
#[derive(Debug)]
pub struct InvocationContext {
    context: Option<ContextMap>,
    stdout: LogWriter,
    stderr: LogWriter,
}

impl InvocationContext {
    pub(crate) fn new(context: Option<ContextMap>, stdout: LogWriter, stderr: LogWriter) -> Self {
        Self {
            context,
            stdout,
            stderr,
        }
    }

    /// The request `context` object, if the caller sent one.
    #[must_use]
    pub fn context(&self) -> Option<&ContextMap> {
        self.context.as_ref()
    }

    /// Looks up a single context option.
    #[must_use]
    pub fn option(&self, key: &str) -> Option<&Value> {
        self.context.as_ref().and_then(|ctx| ctx.get(key))
    }

    /// Writer whose lines are returned in `logs.stdout`.
    pub fn stdout(&mut self) -> &mut LogWriter {
        &mut self.stdout
    }

    /// Writer whose lines are returned in `logs.stderr`.
    pub fn stderr(&mut self) -> &mut LogWriter {
        &mut self.stderr
    }
}

/// User code invoked once per request.
///
/// Implemented for every `Fn(&mut InvocationContext, Value) -> Result<R, HandlerError>`
/// whose result `R` is serializable.
pub trait Handler: Send + Sync + 'static {
    /// Runs the handler.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError` when the handler rejects its input or fails.
    fn call(&self, ctx: &mut InvocationContext, payload: Value) -> Result<Reply, HandlerError>;
}

impl<F, R> Handler for F
where
    F: Fn(&mut InvocationContext, Value) -> Result<R, HandlerError> + Send + Sync + 'static,
    R: ToPayload + 'static,
{
    fn call(&self, ctx: &mut InvocationContext, payload: Value) -> Result<Reply, HandlerError> {
        self(ctx, payload).map(|result| Box::new(result) as Reply)
    }
}
