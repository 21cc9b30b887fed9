//! Handler invocation engine.
//!
//! 1. **Calling convention** (`handler`): `Handler` trait, `InvocationContext`, `HandlerError`
//! 2. **Capture** (`capture`): invocation-scoped stdout/stderr writers
//! 3. **Worker** (`worker`): dedicated thread per call with a cancel handle
//! 4. **Executor** (`executor`): deadline race, classification, health updates
//! 5. **Resolution** (`registry`): handlers by fully-qualified name

pub mod capture;
pub mod executor;
pub mod handler;
pub mod registry;
pub mod worker;

pub use capture::{CapturedOutput, LogWriter, OutputCapture};
pub use executor::{Executor, Invocation};
pub use handler::{parse_payload, Handler, HandlerError, InvocationContext, Reply};
pub use registry::{HandlerRegistry, ResolveError};
pub use worker::{WorkerError, WorkerTask};
