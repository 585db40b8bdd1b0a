//! Object manipulation functions

use serde_json::Value;

use super::{check_arg_count, get_string_arg, subject_and_args};
use crate::error::{EngineError, EngineResult};

fn require_object<'a>(
    func_name: &str,
    subject: &'a Value,
) -> EngineResult<&'a serde_json::Map<String, Value>> {
    subject.as_object().ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "expected an object, got {}",
                crate::value_utils::kind_name(subject)
            ),
        )
    })
}

/// Get all keys of an object
pub fn keys(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("keys", rest, 0)?;
    let fields = require_object("keys", subject)?;
    let keys: Vec<Value> = fields.keys().map(|k| Value::String(k.clone())).collect();
    Ok(Value::Array(keys))
}

/// Get all values of an object
pub fn values(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("values", rest, 0)?;
    let fields = require_object("values", subject)?;
    Ok(Value::Array(fields.values().cloned().collect()))
}

/// Check if an object has a specific key
pub fn has(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("has", rest, 1)?;
    let fields = require_object("has", subject)?;
    let key = get_string_arg("has", rest, 0, "key")?;
    Ok(Value::Bool(fields.contains_key(key)))
}

/// Turn an object into an array of `{key, value}` pairs
pub fn entries(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("entries", rest, 0)?;
    let fields = require_object("entries", subject)?;
    let pairs: Vec<Value> = fields
        .iter()
        .map(|(key, value)| {
            serde_json::json!({
                "key": key,
                "value": value,
            })
        })
        .collect();
    Ok(Value::Array(pairs))
}
