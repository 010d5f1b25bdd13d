//! Execution engine - runs caller-supplied Rhai scripts against injected capabilities.
//!
//! # Process
//!
//! 1. Validate the script text (empty, length ceiling, denylist)
//! 2. Compile it with an engine that has no module loading and no `eval`
//! 3. Bind every capability into a fresh scope by name
//! 4. Evaluate; the last expression or explicit `return` is the result
//! 5. Classify failures as `SyntaxError` / `ReferenceError` / `TypeError` / `Error`
//!
//! The whole window, validation included, is timed.
//!
//! # Sandbox
//!
//! The Rhai standard packages have no filesystem, network or process access,
//! so a script can reach only what a [`CapabilityProvider`] hands it. The
//! denylist below is a coarse textual filter layered on top; it is trivially
//! bypassable and must not be treated as a security boundary.
//!
//! Execution is synchronous and has no internal timeout unless an operation
//! ceiling is configured. Callers run it on a blocking thread.

use std::time::Instant;

use rhai::{AST, Dynamic, Engine, EvalAltResult, Scope, module_resolvers::DummyModuleResolver};
use serde_json::Value;

use super::capabilities::{CapabilityProvider, CapabilitySet};
use crate::models::execution::{ExecutionResult, ScriptError};

/// Longest accepted script, in characters.
pub const MAX_SCRIPT_CHARS: usize = 100_000;

/// Textual patterns rejected before compilation, matched on the script with
/// whitespace removed. Incomplete by nature.
const DENYLIST: &[(&str, &str)] = &[
    ("eval(", "dynamic evaluation"),
    ("import\"", "module import"),
    ("import`", "module import"),
    ("Fn(", "dynamic function pointer"),
    (".call(", "function pointer invocation"),
    (".curry(", "function pointer currying"),
];

pub struct ExecutionEngine {
    engine: Engine,
}

impl ExecutionEngine {
    /// Build the engine once at startup.
    ///
    /// `max_operations = 0` leaves scripts unbounded.
    pub fn new(max_operations: u64, provider: &dyn CapabilityProvider) -> Self {
        let mut engine = Engine::new();

        engine
            .set_module_resolver(DummyModuleResolver::new())
            .disable_symbol("eval")
            .set_max_operations(max_operations)
            .on_print(|text| tracing::debug!(target: "script", "{text}"))
            .on_debug(|text, source, pos| {
                tracing::debug!(target: "script", source = source.unwrap_or_default(), %pos, "{text}")
            });

        provider.register(&mut engine);

        Self { engine }
    }

    pub fn execute(&self, script: &str, capabilities: CapabilitySet) -> ExecutionResult {
        let started = Instant::now();
        let outcome = self.run(script, capabilities);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(value) => ExecutionResult::succeeded(value, elapsed_ms),
            Err(err) => ExecutionResult::failed(&err, elapsed_ms),
        }
    }

    fn run(&self, script: &str, capabilities: CapabilitySet) -> Result<Value, ScriptError> {
        validate_script(script)?;

        let ast = self
            .engine
            .compile(script)
            .map_err(|err| ScriptError::Syntax(err.to_string()))?;

        let mut scope = Scope::new();
        for (name, value) in capabilities {
            scope.push_dynamic(name.as_str(), value);
        }

        let value = self
            .engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, &ast)
            .map_err(|err| classify(&err, &ast))?;

        Ok(to_json(value))
    }
}

/// Reject empty, oversized and denylisted scripts.
pub fn validate_script(script: &str) -> Result<(), ScriptError> {
    if script.trim().is_empty() {
        return Err(ScriptError::Validation("Script must not be empty".to_string()));
    }

    let length = script.chars().count();
    if length > MAX_SCRIPT_CHARS {
        return Err(ScriptError::Validation(format!(
            "Script exceeds maximum length of {MAX_SCRIPT_CHARS} characters (got {length})"
        )));
    }

    let compact: String = script.chars().filter(|c| !c.is_whitespace()).collect();
    if let Some((_, reason)) = DENYLIST
        .iter()
        .find(|(pattern, _)| contains_token(&compact, pattern))
    {
        return Err(ScriptError::Validation(format!(
            "Script contains a forbidden construct ({reason})"
        )));
    }

    Ok(())
}

/// `pattern` occurs in `text` and, when it starts with an identifier
/// character, is not the tail of a longer identifier.
fn contains_token(text: &str, pattern: &str) -> bool {
    let starts_with_ident = pattern.starts_with(is_ident_char);

    text.match_indices(pattern).any(|(index, _)| {
        !starts_with_ident || !text[..index].ends_with(is_ident_char)
    })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn classify(err: &EvalAltResult, ast: &AST) -> ScriptError {
    match err {
        // Report errors raised inside script functions by their root cause
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(inner, ast),
        EvalAltResult::ErrorInModule(_, inner, _) => classify(inner, ast),
        EvalAltResult::ErrorParsing(kind, _) => ScriptError::Syntax(kind.to_string()),
        EvalAltResult::ErrorFunctionNotFound(signature, _) if is_overload_mismatch(signature, ast) => {
            ScriptError::Type(err.to_string())
        }
        EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorPropertyNotFound(..)
        | EvalAltResult::ErrorModuleNotFound(..) => ScriptError::Reference(err.to_string()),
        EvalAltResult::ErrorMismatchDataType(..)
        | EvalAltResult::ErrorMismatchOutputType(..)
        | EvalAltResult::ErrorIndexingType(..)
        | EvalAltResult::ErrorDotExpr(..)
        | EvalAltResult::ErrorUnboundThis(..)
        | EvalAltResult::ErrorFor(..) => ScriptError::Type(err.to_string()),
        EvalAltResult::ErrorRuntime(value, _) => ScriptError::Other(value.to_string()),
        _ => ScriptError::Other(err.to_string()),
    }
}

/// A failed call whose target exists but not for these argument types.
///
/// Rhai reports `"abc" * 2` as a missing `*` overload; operators always
/// exist, so any miss on one is a type mismatch. The same holds for a
/// script-defined function called with the wrong arguments.
fn is_overload_mismatch(signature: &str, ast: &AST) -> bool {
    let name = signature
        .split_once(" (")
        .map_or(signature, |(name, _)| name)
        .trim();

    let is_operator = !name.is_empty() && !name.contains(is_ident_char);
    is_operator || ast.iter_functions().any(|function| function.name == name)
}

fn to_json(value: Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }

    rhai::serde::from_dynamic::<Value>(&value).unwrap_or_else(|_| Value::String(value.to_string()))
}
