//! Failure classification: maps a caught failure condition to an `ErrorRecord`.
//!
//! Every failure the server can observe is first named as a [`Cause`]. The
//! cause alone decides the [`ErrorKind`] and the HTTP status; the message and
//! trace come from the failure itself.

use serde_json::error::Category;

use crate::error::{ErrorKind, ErrorRecord};
use crate::trace;

// ---------------------------------------------------------------------------
// Cause
// ---------------------------------------------------------------------------

/// The condition that ended an invocation unsuccessfully.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    /// The request body is present but is not valid JSON.
    MalformedBody,
    /// The envelope or the handler rejected the payload/context shape or type.
    InvalidInput,
    /// The handler returned an error.
    HandlerFailed,
    /// The handler panicked.
    HandlerPanicked,
    /// The invocation ran past its `timeout`.
    DeadlineExceeded,
    /// The handler's result has no JSON representation.
    UnrepresentableResult,
    /// Encoding the response failed for any other reason.
    EncodingFailed,
    /// The dedicated worker could not be started or vanished without a result.
    WorkerUnavailable,
}

impl Cause {
    /// Returns the error tier reported for this cause.
    #[must_use]
    pub const fn kind(self) -> ErrorKind {
        match self {
            Self::InvalidInput => ErrorKind::InputError,
            Self::HandlerFailed | Self::HandlerPanicked | Self::UnrepresentableResult => {
                ErrorKind::FunctionError
            }
            Self::MalformedBody
            | Self::DeadlineExceeded
            | Self::EncodingFailed
            | Self::WorkerUnavailable => ErrorKind::SystemError,
        }
    }

    /// Returns the HTTP status code of a response carrying this cause.
    #[must_use]
    pub const fn status(self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::MalformedBody | Self::HandlerFailed | Self::HandlerPanicked => 500,
            Self::UnrepresentableResult => 422,
            Self::EncodingFailed => 502,
            Self::WorkerUnavailable => 503,
            Self::DeadlineExceeded => 504,
        }
    }

    /// Classifies a serializer error raised while converting a handler result.
    ///
    /// I/O errors are infrastructure failures; every other category means the
    /// value itself cannot be represented.
    #[must_use]
    pub fn of_serialize_error(err: &serde_json::Error) -> Self {
        match err.classify() {
            Category::Io => Self::EncodingFailed,
            Category::Syntax | Category::Data | Category::Eof => Self::UnrepresentableResult,
        }
    }
}

/// Builds the wire record for a failure.
#[must_use]
pub fn classify(cause: Cause, message: impl Into<String>, stacktrace: Vec<String>) -> ErrorRecord {
    ErrorRecord {
        kind: cause.kind(),
        message: message.into(),
        stacktrace,
    }
}

// ---------------------------------------------------------------------------
// Fault
// ---------------------------------------------------------------------------

/// A classified failure: the cause plus the record sent to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    cause: Cause,
    record: ErrorRecord,
}

impl Fault {
    #[must_use]
    pub fn new(cause: Cause, message: impl Into<String>, stacktrace: Vec<String>) -> Self {
        Self {
            cause,
            record: classify(cause, message, stacktrace),
        }
    }

    /// Classifies an error, using its display text as the message and its
    /// rendered chain as the trace.
    #[must_use]
    pub fn from_error(cause: Cause, err: &anyhow::Error) -> Self {
        Self::new(cause, err.to_string(), trace::render(err))
    }

    /// Classifies a failed conversion of a handler result into JSON.
    #[must_use]
    pub fn from_serialize_error(err: serde_json::Error) -> Self {
        let cause = Cause::of_serialize_error(&err);
        let message = match cause {
            Cause::UnrepresentableResult => format!("result is not JSON serializable: {err}"),
            _ => format!("failed to serialize result: {err}"),
        };
        let chain = anyhow::Error::new(err).context(message.clone());
        Self::new(cause, message, trace::render(&chain))
    }

    #[must_use]
    pub fn cause(&self) -> Cause {
        self.cause
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.record.kind
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.record.message
    }

    #[must_use]
    pub fn stacktrace(&self) -> &[String] {
        &self.record.stacktrace
    }

    #[must_use]
    pub fn record(&self) -> &ErrorRecord {
        &self.record
    }

    #[must_use]
    pub fn into_record(self) -> ErrorRecord {
        self.record
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::anyhow;

    use super::*;

    #[test]
    fn taxonomy_table() {
        let cases = [
            (Cause::MalformedBody, ErrorKind::SystemError, 500),
            (Cause::InvalidInput, ErrorKind::InputError, 400),
            (Cause::HandlerFailed, ErrorKind::FunctionError, 500),
            (Cause::HandlerPanicked, ErrorKind::FunctionError, 500),
            (Cause::DeadlineExceeded, ErrorKind::SystemError, 504),
            (Cause::UnrepresentableResult, ErrorKind::FunctionError, 422),
            (Cause::EncodingFailed, ErrorKind::SystemError, 502),
            (Cause::WorkerUnavailable, ErrorKind::SystemError, 503),
        ];
        for (cause, kind, status) in cases {
            assert_eq!(cause.kind(), kind, "{cause:?}");
            assert_eq!(cause.status(), status, "{cause:?}");
        }
    }

    #[test]
    fn classify_keeps_message_and_trace() {
        let record = classify(
            Cause::HandlerFailed,
            "oh no!",
            vec!["frame 1".to_string(), "frame 2".to_string()],
        );
        assert_eq!(record.kind, ErrorKind::FunctionError);
        assert_eq!(record.message, "oh no!");
        assert_eq!(record.stacktrace, vec!["frame 1", "frame 2"]);
    }

    #[test]
    fn fault_from_error_uses_display_text() {
        let fault = Fault::from_error(Cause::HandlerFailed, &anyhow!("oh no!"));
        assert_eq!(fault.kind(), ErrorKind::FunctionError);
        assert_eq!(fault.message(), "oh no!");
        assert_eq!(fault.stacktrace()[0], "oh no!");
    }

    #[test]
    fn non_string_keys_are_unrepresentable() {
        let mut binary = BTreeMap::new();
        binary.insert(vec![0u8, 1, 2], "bytes");
        let err = serde_json::to_value(&binary).unwrap_err();

        let fault = Fault::from_serialize_error(err);
        assert_eq!(fault.cause(), Cause::UnrepresentableResult);
        assert_eq!(fault.kind(), ErrorKind::FunctionError);
        assert!(fault.message().contains("not JSON serializable"));
        assert!(!fault.stacktrace().is_empty());
    }

    #[test]
    fn io_errors_are_system_errors() {
        struct ClosedPipe;

        impl std::io::Write for ClosedPipe {
            fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed"))
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let err = serde_json::to_writer(ClosedPipe, &"payload").unwrap_err();
        assert_eq!(Cause::of_serialize_error(&err), Cause::EncodingFailed);
        assert_eq!(
            Fault::from_serialize_error(err).kind(),
            ErrorKind::SystemError
        );
    }
}
