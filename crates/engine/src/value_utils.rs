//! Shared readings of serde_json::Value used across the engine

use serde_json::Value;

/// Node-kind label used in error messages, matching the engine's value
/// model: null, bool, number, text, array, object.
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// True for Array and Object nodes
#[inline]
pub fn is_container(value: &Value) -> bool {
    value.is_array() || value.is_object()
}

/// A node counts as truthy when it holds something: `true`, a non-zero
/// finite number, non-empty text, or a non-empty container.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(elements) => !elements.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Truthiness of an optional value; absent is falsy
#[inline]
pub fn is_truthy_opt(value: Option<&Value>) -> bool {
    value.is_some_and(is_truthy)
}

/// Numeric reading of a node: numbers directly, text and bool coerced.
/// `None` when the node has no numeric reading.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().or_else(|| n.as_i64().map(|i| i as f64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Integer reading of a node, coercing text and bool
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(i64::from(*b)),
        _ => None,
    }
}

/// The text a value contributes to merged template output.
///
/// Text is emitted without quotes; containers as their compact JSON
/// serialization.
pub fn text_form(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}
