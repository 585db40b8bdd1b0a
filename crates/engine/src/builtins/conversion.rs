//! Type conversion functions

use serde_json::Value;

use super::{check_arg_count, require_string, subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::value_utils;

/// Maximum JSON string length to parse (1MB)
const MAX_JSON_PARSE_LENGTH: usize = 1024 * 1024;

/// Convert value to its text form; containers serialize to JSON
pub fn to_string(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("to_string", rest, 0)?;
    Ok(Value::String(value_utils::text_form(subject)))
}

/// Convert value to a number
pub fn to_number(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("to_number", rest, 0)?;
    let number = value_utils::as_f64(subject).ok_or_else(|| {
        EngineError::function_argument(
            "to_number",
            format!(
                "cannot convert {} to number",
                value_utils::kind_name(subject)
            ),
        )
    })?;
    Ok(serde_json::json!(number))
}

/// Convert value to boolean (truthy/falsy semantics)
pub fn to_boolean(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("to_boolean", rest, 0)?;
    Ok(Value::Bool(value_utils::is_truthy(subject)))
}

/// Serialize any value to a JSON string
pub fn to_json(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("to_json", rest, 0)?;
    let serialized = serde_json::to_string(subject).map_err(|e| {
        EngineError::function_argument("to_json", format!("failed to serialize: {e}"))
    })?;
    Ok(Value::String(serialized))
}

/// Parse a JSON string into a value
pub fn parse_json(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("parse_json", rest, 0)?;
    let text = require_string("parse_json", subject)?;
    if text.len() > MAX_JSON_PARSE_LENGTH {
        return Err(EngineError::function_argument(
            "parse_json",
            format!(
                "JSON string too large: {} bytes (max {MAX_JSON_PARSE_LENGTH} bytes)",
                text.len()
            ),
        ));
    }
    serde_json::from_str(text)
        .map_err(|e| EngineError::function_argument("parse_json", format!("invalid JSON: {e}")))
}
