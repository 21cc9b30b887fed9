//! Resolution of handlers by fully-qualified name.
//!
//! Handlers are registered at startup as `module.path.function`. The server
//! resolves exactly one of them before it starts accepting requests.

use std::collections::HashMap;
use std::sync::Arc;

use super::handler::Handler;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("handler name `{0}` must have the form `module.function`")]
    MissingFunctionName(String),
    #[error("no module named `{0}`")]
    ModuleNotFound(String),
    #[error("module `{module}` has no handler `{function}`")]
    FunctionNotFound { module: String, function: String },
    #[error("duplicate handler `{0}`")]
    DuplicateHandler(String),
}

/// Splits `module.function` on the last dot.
fn split_name(fqn: &str) -> Result<(&str, &str), ResolveError> {
    match fqn.rsplit_once('.') {
        Some((module, function)) if !module.is_empty() && !function.is_empty() => {
            Ok((module, function))
        }
        _ => Err(ResolveError::MissingFunctionName(fqn.to_string())),
    }
}

/// Registry of handlers (fully-qualified name -> handler).
///
/// Built during initialization, read-only afterwards.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` under `fqn`.
    ///
    /// # Errors
    ///
    /// Returns `MissingFunctionName` if `fqn` is not of the form
    /// `module.function`, or `DuplicateHandler` if the name is taken.
    pub fn register(
        &mut self,
        fqn: impl Into<String>,
        handler: impl Handler,
    ) -> Result<(), ResolveError> {
        let fqn = fqn.into();
        split_name(&fqn)?;
        if self.handlers.contains_key(&fqn) {
            return Err(ResolveError::DuplicateHandler(fqn));
        }
        self.handlers.insert(fqn, Arc::new(handler));
        Ok(())
    }

    /// Looks up the handler registered under `fqn`.
    ///
    /// # Errors
    ///
    /// Distinguishes a malformed name, an unknown module and an unknown
    /// function within a known module.
    pub fn resolve(&self, fqn: &str) -> Result<Arc<dyn Handler>, ResolveError> {
        let (module, function) = split_name(fqn)?;
        if let Some(handler) = self.handlers.get(fqn) {
            return Ok(Arc::clone(handler));
        }

        let module_known = self
            .handlers
            .keys()
            .any(|name| matches!(split_name(name), Ok((m, _)) if m == module));
        if module_known {
            Err(ResolveError::FunctionNotFound {
                module: module.to_string(),
                function: function.to_string(),
            })
        } else {
            Err(ResolveError::ModuleNotFound(module.to_string()))
        }
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
