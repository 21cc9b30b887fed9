//! Function server core: request/response envelopes, the three-kind error
//! taxonomy, failure classification and result serialization.

pub mod classify;
pub mod envelope;
pub mod error;
pub mod payload;
pub mod trace;

pub use classify::{classify, Cause, Fault};
pub use envelope::{
    decode, encode, ContextMap, DecodeError, Encoded, EnvelopeError, InvocationRequest, Logs,
    RequestEnvelope, ResponseContext, ResponseEnvelope,
};
pub use error::{ErrorKind, ErrorRecord};
pub use payload::ToPayload;
