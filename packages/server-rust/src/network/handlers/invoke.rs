//! Invocation endpoint: decode, validate, execute, encode.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use fnserver_core::{decode, Cause, Encoded, Fault, InvocationRequest};
use tracing::{debug, info};

use super::AppState;
use crate::invoke::Invocation;

/// Handles every request that is not `/healthz`; the body is the request
/// envelope.
///
/// Invocations are serialized through the state's gate. Once shutdown closes
/// the gate, waiting and new requests get a `SystemError` (503). Every
/// outcome, including a malformed body, produces a response envelope.
pub async fn invoke_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let Ok(_permit) = state.gate.acquire().await else {
        info!("invocation refused: server is shutting down");
        let fault = Fault::new(
            Cause::WorkerUnavailable,
            "server is shutting down and not accepting invocations",
            Vec::new(),
        );
        return envelope_response(Invocation::rejected(fault).encode());
    };
    let _in_flight = state.shutdown.track_invocation();

    let invocation = match decode(&body) {
        Err(err) => {
            debug!(error = %err, "malformed request body");
            Invocation::rejected(Fault::from_error(
                Cause::MalformedBody,
                &anyhow::Error::new(err),
            ))
        }
        Ok(envelope) => match InvocationRequest::from_envelope(envelope) {
            Err(err) => {
                debug!(error = %err, "invalid request envelope");
                Invocation::rejected(Fault::from_error(
                    Cause::InvalidInput,
                    &anyhow::Error::new(err),
                ))
            }
            Ok(request) => {
                state
                    .executor
                    .execute(
                        Arc::clone(&state.handler),
                        request.context,
                        request.payload,
                        request.timeout_ms,
                    )
                    .await
            }
        },
    };

    envelope_response(invocation.encode())
}

fn envelope_response(encoded: Encoded) -> Response {
    let status = StatusCode::from_u16(encoded.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, "application/json")],
        encoded.body,
    )
        .into_response()
}
