//! Wire-level error types carried in the response envelope.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The three error tiers surfaced to callers.
///
/// Serialized by variant name (`"InputError"`, `"FunctionError"`,
/// `"SystemError"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// The caller supplied an invalid payload or context.
    InputError,
    /// The handler failed on its own, including unserializable results.
    FunctionError,
    /// Infrastructure failure: malformed body, deadline, encoding.
    SystemError,
}

impl ErrorKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InputError => "InputError",
            Self::FunctionError => "FunctionError",
            Self::SystemError => "SystemError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured error reported in `context.error` of a response envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    pub stacktrace: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_serializes_as_variant_name() {
        for kind in [
            ErrorKind::InputError,
            ErrorKind::FunctionError,
            ErrorKind::SystemError,
        ] {
            let json = serde_json::to_value(kind).unwrap();
            assert_eq!(json, serde_json::Value::String(kind.to_string()));
        }
    }

    #[test]
    fn record_uses_type_field() {
        let record = ErrorRecord {
            kind: ErrorKind::FunctionError,
            message: "oh no!".to_string(),
            stacktrace: vec!["oh no!".to_string()],
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "FunctionError");
        assert_eq!(json["message"], "oh no!");
        assert_eq!(json["stacktrace"], serde_json::json!(["oh no!"]));
        assert!(json.get("kind").is_none());

        let back: ErrorRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
