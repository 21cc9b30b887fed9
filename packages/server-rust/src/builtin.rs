//! The `example.handler` module shipped with the binary.

use std::io::Write;

use serde_json::Value;

use crate::invoke::{parse_payload, HandlerError, HandlerRegistry, InvocationContext, ResolveError};

/// Echoes the payload back.
fn dummy(_ctx: &mut InvocationContext, payload: Value) -> Result<Value, HandlerError> {
    Ok(payload)
}

/// Greets `name` from `place`, both optional.
fn hello(_ctx: &mut InvocationContext, payload: Value) -> Result<String, HandlerError> {
    let field = |key: &str, fallback: &'static str| {
        payload
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    Ok(format!(
        "Hello, {} from {}",
        field("name", "Noone"),
        field("place", "Nowhere")
    ))
}

/// Lowercases a string payload; anything else is an input error.
fn lower(_ctx: &mut InvocationContext, payload: Value) -> Result<String, HandlerError> {
    Ok(parse_payload::<String>(payload)?.to_lowercase())
}

/// Writes the payload to both captured streams and returns nothing.
fn logger(ctx: &mut InvocationContext, payload: Value) -> Result<(), HandlerError> {
    writeln!(ctx.stdout(), "stdout: {payload}")?;
    writeln!(ctx.stderr(), "stderr: {payload}")?;
    Ok(())
}

/// Builds a registry holding `example.handler.{dummy,hello,lower,logger}`.
///
/// # Errors
///
/// Only fails if the names above collide, which they do not.
pub fn example_registry() -> Result<HandlerRegistry, ResolveError> {
    let mut registry = HandlerRegistry::new();
    registry.register("example.handler.dummy", dummy)?;
    registry.register("example.handler.hello", hello)?;
    registry.register("example.handler.lower", lower)?;
    registry.register("example.handler.logger", logger)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::invoke::LogWriter;

    fn run(name: &str, payload: Value) -> Result<Value, HandlerError> {
        let handler = example_registry().unwrap().resolve(name).unwrap();
        let mut ctx = InvocationContext::new(None, LogWriter::new(), LogWriter::new());
        handler
            .call(&mut ctx, payload)
            .map(|reply| reply.to_payload().unwrap())
    }

    #[test]
    fn registry_lists_all_examples() {
        let registry = example_registry().unwrap();
        let mut names = registry.names();
        names.sort_unstable();
        assert_eq!(
            names,
            vec![
                "example.handler.dummy",
                "example.handler.hello",
                "example.handler.logger",
                "example.handler.lower",
            ]
        );
    }

    #[test]
    fn hello_uses_defaults() {
        assert_eq!(
            run("example.handler.hello", Value::Null).unwrap(),
            json!("Hello, Noone from Nowhere")
        );
        assert_eq!(
            run("example.handler.hello", json!({"name": "Jon", "place": "Winterfell"})).unwrap(),
            json!("Hello, Jon from Winterfell")
        );
    }

    #[test]
    fn lower_rejects_non_strings() {
        assert_eq!(run("example.handler.lower", json!("LOUD")).unwrap(), json!("loud"));
        assert!(matches!(
            run("example.handler.lower", json!(1)),
            Err(HandlerError::InvalidInput(_))
        ));
    }

    #[test]
    fn dummy_echoes() {
        assert_eq!(
            run("example.handler.dummy", json!({"k": [1, 2]})).unwrap(),
            json!({"k": [1, 2]})
        );
    }

    #[test]
    fn logger_writes_both_streams() {
        let handler = example_registry()
            .unwrap()
            .resolve("example.handler.logger")
            .unwrap();
        let stdout = LogWriter::new();
        let stderr = LogWriter::new();
        let mut ctx = InvocationContext::new(None, stdout.clone(), stderr.clone());
        let reply = handler.call(&mut ctx, json!(3)).unwrap();

        assert_eq!(reply.to_payload().unwrap(), Value::Null);
        assert_eq!(stdout.lines(), vec!["stdout: 3"]);
        assert_eq!(stderr.lines(), vec!["stderr: 3"]);
    }
}
