//! Request/response envelope codec.
//!
//! A request body decodes into a [`RequestEnvelope`] (or nothing, when the body
//! is empty). Validation into an [`InvocationRequest`] is a separate step so
//! that a malformed body (`SystemError`) is distinguishable from a well-formed
//! body with the wrong shape (`InputError`).
//!
//! Encoding always produces a well-formed response envelope. A result that
//! cannot be serialized is reclassified and the response is re-encoded with a
//! null payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::classify::{Cause, Fault};
use crate::error::ErrorRecord;
use crate::payload::ToPayload;

/// Key-value context object supplied alongside the payload.
pub type ContextMap = Map<String, Value>;

/// Context option holding the invocation deadline in milliseconds.
pub const TIMEOUT_OPTION: &str = "timeout";

/// Body used when even the fallback response cannot be encoded.
const LAST_RESORT_BODY: &[u8] = br#"{"context":{"error":{"type":"SystemError","message":"failed to encode response envelope","stacktrace":[]},"logs":{"stdout":[],"stderr":[]}},"payload":null}"#;

// ---------------------------------------------------------------------------
// Request side
// ---------------------------------------------------------------------------

/// The request body is present but is not valid JSON.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct DecodeError(#[from] serde_json::Error);

/// A well-formed body whose shape does not describe an invocation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnvelopeError {
    #[error("request body is empty; expected an object with `context` and `payload`")]
    Empty,
    #[error("request body must be a JSON object with `context` and `payload`")]
    NotAnObject,
    #[error("request envelope is missing `{0}`")]
    MissingField(&'static str),
    #[error("`context` must be an object or null")]
    ContextNotObject,
    #[error("`context.timeout` must be a non-negative integer number of milliseconds")]
    InvalidTimeout,
}

/// A decoded but not yet validated request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    raw: Value,
}

impl RequestEnvelope {
    /// Builds the envelope a client would send for `context` and `payload`.
    #[must_use]
    pub fn new(context: Option<ContextMap>, payload: Value) -> Self {
        let mut fields = Map::new();
        fields.insert(
            "context".to_string(),
            context.map_or(Value::Null, Value::Object),
        );
        fields.insert("payload".to_string(), payload);
        Self {
            raw: Value::Object(fields),
        }
    }

    /// Returns the decoded JSON as received.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.raw
    }
}

/// Decodes a raw request body.
///
/// An empty body yields `Ok(None)`: the null envelope.
///
/// # Errors
///
/// Returns `DecodeError` when the body is present but is not valid JSON.
pub fn decode(body: &[u8]) -> Result<Option<RequestEnvelope>, DecodeError> {
    if body.is_empty() {
        return Ok(None);
    }
    let raw: Value = serde_json::from_slice(body)?;
    Ok(Some(RequestEnvelope { raw }))
}

/// A validated invocation: what the executor needs to call the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationRequest {
    pub context: Option<ContextMap>,
    pub payload: Value,
    /// Deadline in milliseconds. `None` waits without bound.
    pub timeout_ms: Option<u64>,
}

impl InvocationRequest {
    /// Validates a decoded envelope.
    ///
    /// Both `context` and `payload` keys must be present; either may be null.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError` for the null envelope, non-object bodies,
    /// missing keys, a non-object `context` or an invalid `timeout` option.
    pub fn from_envelope(envelope: Option<RequestEnvelope>) -> Result<Self, EnvelopeError> {
        let Some(RequestEnvelope { raw }) = envelope else {
            return Err(EnvelopeError::Empty);
        };
        let Value::Object(mut fields) = raw else {
            return Err(EnvelopeError::NotAnObject);
        };

        let context = fields
            .remove("context")
            .ok_or(EnvelopeError::MissingField("context"))?;
        let payload = fields
            .remove("payload")
            .ok_or(EnvelopeError::MissingField("payload"))?;

        let context = match context {
            Value::Null => None,
            Value::Object(map) => Some(map),
            _ => return Err(EnvelopeError::ContextNotObject),
        };
        let timeout_ms = timeout_option(context.as_ref())?;

        Ok(Self {
            context,
            payload,
            timeout_ms,
        })
    }
}

/// Reads the `timeout` option. Absent, null and `0` all mean no deadline.
///
/// # Errors
///
/// Returns `EnvelopeError::InvalidTimeout` unless the value is a
/// non-negative integer.
pub fn timeout_option(context: Option<&ContextMap>) -> Result<Option<u64>, EnvelopeError> {
    match context.and_then(|ctx| ctx.get(TIMEOUT_OPTION)) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => match value.as_u64() {
            Some(0) => Ok(None),
            Some(ms) => Ok(Some(ms)),
            None => Err(EnvelopeError::InvalidTimeout),
        },
    }
}

// ---------------------------------------------------------------------------
// Response side
// ---------------------------------------------------------------------------

/// Output captured from the handler, one entry per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Logs {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseContext {
    pub error: Option<ErrorRecord>,
    pub logs: Logs,
}

/// The response body. `error` is set exactly when the invocation failed, in
/// which case `payload` is null.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub context: ResponseContext,
    pub payload: Value,
}

/// An encoded response: body bytes plus the HTTP status that goes with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoded {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Encodes the outcome of an invocation into a response envelope.
///
/// `result` is ignored when `error` is set. If the result cannot be
/// serialized the failure is classified, its trace is appended to `stderr`
/// and the envelope is encoded with a null payload instead.
#[must_use]
pub fn encode(
    result: Option<&dyn ToPayload>,
    error: Option<Fault>,
    stdout: Vec<String>,
    mut stderr: Vec<String>,
) -> Encoded {
    let payload = match (&error, result) {
        (None, Some(result)) => match result.to_payload() {
            Ok(value) => value,
            Err(err) => {
                let fault = Fault::from_serialize_error(err);
                stderr.extend_from_slice(fault.stacktrace());
                return write(Value::Null, Some(fault), Logs { stdout, stderr });
            }
        },
        _ => Value::Null,
    };
    write(payload, error, Logs { stdout, stderr })
}

fn write(payload: Value, error: Option<Fault>, logs: Logs) -> Encoded {
    let status = error.as_ref().map_or(200, |fault| fault.cause().status());
    let envelope = ResponseEnvelope {
        context: ResponseContext {
            error: error.map(Fault::into_record),
            logs,
        },
        payload,
    };

    match serde_json::to_vec(&envelope) {
        Ok(body) => Encoded { status, body },
        Err(err) => {
            let fault = Fault::from_error(
                Cause::EncodingFailed,
                &anyhow::Error::new(err).context("failed to encode response envelope"),
            );
            let Logs { stdout, mut stderr } = envelope.context.logs;
            stderr.extend_from_slice(fault.stacktrace());

            let status = fault.cause().status();
            let fallback = ResponseEnvelope {
                context: ResponseContext {
                    error: Some(fault.into_record()),
                    logs: Logs { stdout, stderr },
                },
                payload: Value::Null,
            };
            let body = serde_json::to_vec(&fallback).unwrap_or_else(|err| {
                error!(error = %err, "fallback response could not be encoded");
                LAST_RESORT_BODY.to_vec()
            });
            Encoded { status, body }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::anyhow;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn parse(encoded: &Encoded) -> ResponseEnvelope {
        serde_json::from_slice(&encoded.body).expect("response must be valid JSON")
    }

    fn request(body: &str) -> Result<InvocationRequest, EnvelopeError> {
        InvocationRequest::from_envelope(decode(body.as_bytes()).unwrap())
    }

    #[test]
    fn decode_valid_envelope() {
        let body = r#"{"context": null, "payload": {"name": "Jon", "place": "Winterfell"}}"#;
        let envelope = decode(body.as_bytes()).unwrap().unwrap();
        assert_eq!(envelope.as_value()["context"], Value::Null);
        assert_eq!(
            envelope.as_value()["payload"],
            json!({"name": "Jon", "place": "Winterfell"})
        );
    }

    #[test]
    fn decode_empty_body_is_null_envelope() {
        assert!(decode(b"").unwrap().is_none());
    }

    #[test]
    fn decode_malformed_body_fails() {
        assert!(decode(b"{").is_err());
        assert!(decode(b"   ").is_err());
    }

    #[test]
    fn request_from_valid_envelope() {
        let req = request(r#"{"context": {"timeout": 250, "trace": "x"}, "payload": [1, 2]}"#)
            .unwrap();
        assert_eq!(req.payload, json!([1, 2]));
        assert_eq!(req.timeout_ms, Some(250));
        assert_eq!(req.context.unwrap()["trace"], "x");
    }

    #[test]
    fn request_shape_violations() {
        assert_eq!(
            InvocationRequest::from_envelope(None).unwrap_err(),
            EnvelopeError::Empty
        );
        assert_eq!(request("[1, 2]").unwrap_err(), EnvelopeError::NotAnObject);
        assert_eq!(
            request(r#"{"payload": 1}"#).unwrap_err(),
            EnvelopeError::MissingField("context")
        );
        assert_eq!(
            request(r#"{"context": null}"#).unwrap_err(),
            EnvelopeError::MissingField("payload")
        );
        assert_eq!(
            request(r#"{"context": "ctx", "payload": 1}"#).unwrap_err(),
            EnvelopeError::ContextNotObject
        );
    }

    #[test]
    fn timeout_option_values() {
        let ctx = |v: Value| json!({ "timeout": v }).as_object().cloned().unwrap();

        assert_eq!(timeout_option(None), Ok(None));
        assert_eq!(timeout_option(Some(&ContextMap::new())), Ok(None));
        assert_eq!(timeout_option(Some(&ctx(Value::Null))), Ok(None));
        assert_eq!(timeout_option(Some(&ctx(json!(0)))), Ok(None));
        assert_eq!(timeout_option(Some(&ctx(json!(1500)))), Ok(Some(1500)));
        assert_eq!(
            timeout_option(Some(&ctx(json!(-1)))),
            Err(EnvelopeError::InvalidTimeout)
        );
        assert_eq!(
            timeout_option(Some(&ctx(json!("10")))),
            Err(EnvelopeError::InvalidTimeout)
        );
        assert_eq!(
            timeout_option(Some(&ctx(json!(1.5)))),
            Err(EnvelopeError::InvalidTimeout)
        );
    }

    #[test]
    fn client_envelope_round_trips_through_decode() {
        let envelope = RequestEnvelope::new(None, json!("Hello!"));
        let body = serde_json::to_vec(envelope.as_value()).unwrap();
        let req = request(std::str::from_utf8(&body).unwrap()).unwrap();
        assert_eq!(req.context, None);
        assert_eq!(req.payload, json!("Hello!"));
    }

    #[test]
    fn encode_success() {
        let result = "Hello, Jon from Winterfell".to_string();
        let encoded = encode(
            Some(&result),
            None,
            vec!["stdout".to_string()],
            vec!["stderr".to_string()],
        );
        assert_eq!(encoded.status, 200);

        let response = parse(&encoded);
        assert_eq!(response.payload, json!("Hello, Jon from Winterfell"));
        assert!(response.context.error.is_none());
        assert_eq!(response.context.logs.stdout, vec!["stdout"]);
        assert_eq!(response.context.logs.stderr, vec!["stderr"]);
    }

    #[test]
    fn encode_error_drops_result() {
        let result = 42;
        let fault = Fault::from_error(Cause::HandlerFailed, &anyhow!("oh no!"));
        let encoded = encode(Some(&result), Some(fault), vec![], vec![]);
        assert_eq!(encoded.status, 500);

        let response = parse(&encoded);
        assert_eq!(response.payload, Value::Null);
        let error = response.context.error.unwrap();
        assert_eq!(error.kind, ErrorKind::FunctionError);
        assert_eq!(error.message, "oh no!");
    }

    #[test]
    fn encode_unrepresentable_result_falls_back() {
        let mut binary = BTreeMap::new();
        binary.insert(b"bytes".to_vec(), 1u8);

        let encoded = encode(
            Some(&binary),
            None,
            vec!["out".to_string()],
            vec!["written by handler".to_string()],
        );
        assert_eq!(encoded.status, 422);

        let response = parse(&encoded);
        assert_eq!(response.payload, Value::Null);
        let error = response.context.error.unwrap();
        assert_eq!(error.kind, ErrorKind::FunctionError);
        assert!(error.message.contains("not JSON serializable"));
        assert!(!error.stacktrace.is_empty());

        // Handler output first, then the trace.
        let stderr = &response.context.logs.stderr;
        assert_eq!(stderr[0], "written by handler");
        assert_eq!(&stderr[1..], error.stacktrace.as_slice());
        assert_eq!(response.context.logs.stdout, vec!["out"]);
    }

    #[test]
    fn encode_non_finite_result_is_unrepresentable() {
        for result in [f64::NAN, f64::INFINITY] {
            let encoded = encode(Some(&result), None, vec![], vec![]);
            assert_eq!(encoded.status, 422);

            let response = parse(&encoded);
            assert_eq!(response.payload, Value::Null);
            let error = response.context.error.unwrap();
            assert_eq!(error.kind, ErrorKind::FunctionError);
            assert!(error.message.contains("not JSON serializable"));
            assert_eq!(response.context.logs.stderr, error.stacktrace);
        }
    }

    #[test]
    fn encode_without_result_or_error_is_null_payload() {
        let encoded = encode(None, None, vec![], vec![]);
        let response = parse(&encoded);
        assert_eq!(encoded.status, 200);
        assert_eq!(response.payload, Value::Null);
        assert!(response.context.error.is_none());
    }

    #[test]
    fn last_resort_body_is_a_valid_envelope() {
        let response: ResponseEnvelope = serde_json::from_slice(LAST_RESORT_BODY).unwrap();
        assert_eq!(
            response.context.error.unwrap().kind,
            ErrorKind::SystemError
        );
        assert_eq!(response.payload, Value::Null);
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-zA-Z0-9 ]{0,16}".prop_map(Value::String),
        ]
    }

    proptest! {
        #[test]
        fn malformed_bodies_encode_as_system_errors(body in "\\PC{1,64}") {
            if let Err(err) = decode(body.as_bytes()) {
                let fault = Fault::from_error(Cause::MalformedBody, &anyhow::Error::new(err));
                let stderr = fault.stacktrace().to_vec();
                let response = parse(&encode(None, Some(fault), vec![], stderr));
                prop_assert_eq!(response.context.error.unwrap().kind, ErrorKind::SystemError);
                prop_assert_eq!(response.payload, Value::Null);
            }
        }

        #[test]
        fn error_present_iff_payload_null(
            leaf in json_leaf(),
            items in prop::collection::vec(json_leaf(), 0..4),
            failed in any::<bool>(),
        ) {
            let result = json!({ "leaf": leaf, "items": items });
            let error = failed.then(|| Fault::from_error(Cause::HandlerFailed, &anyhow!("boom")));
            let response = parse(&encode(Some(&result), error, vec![], vec![]));
            prop_assert_eq!(response.context.error.is_some(), response.payload.is_null());
        }
    }
}
