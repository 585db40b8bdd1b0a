//! Type predicates and other general-purpose functions

use serde_json::Value;

use super::{check_arg_count, subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::value_utils;

/// Length of a string (in characters) or an array
pub fn length(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("length", rest, 0)?;
    let length = match subject {
        Value::String(text) => text.chars().count(),
        Value::Array(elements) => elements.len(),
        other => {
            return Err(EngineError::function_argument(
                "length",
                format!(
                    "expected a string or array, got {}",
                    value_utils::kind_name(other)
                ),
            ));
        }
    };
    Ok(Value::Number((length as i64).into()))
}

/// Size of any node: array elements, object fields, string characters.
/// Null counts zero, other value nodes count one.
pub fn size(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("size", rest, 0)?;
    let size = match subject {
        Value::Null => 0,
        Value::Array(elements) => elements.len(),
        Value::Object(fields) => fields.len(),
        Value::String(text) => text.chars().count(),
        _ => 1,
    };
    Ok(Value::Number((size as i64).into()))
}

/// True when the subject is null
pub fn is_null(current: &Value, args: &[Value]) -> EngineResult<Value> {
    // the subject may legitimately be null, so no subject/args shuffle here
    let subject = args.first().unwrap_or(current);
    Ok(Value::Bool(subject.is_null()))
}

/// True when the subject is an array
pub fn is_array(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("is_array", rest, 0)?;
    Ok(Value::Bool(subject.is_array()))
}

/// True when the subject is an object
pub fn is_object(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("is_object", rest, 0)?;
    Ok(Value::Bool(subject.is_object()))
}

/// True when the subject is a string
pub fn is_string(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("is_string", rest, 0)?;
    Ok(Value::Bool(subject.is_string()))
}

/// True when the subject is a number
pub fn is_number(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("is_number", rest, 0)?;
    Ok(Value::Bool(subject.is_number()))
}

/// The fallback argument when the subject is null, the subject otherwise
pub fn if_missing(current: &Value, args: &[Value]) -> EngineResult<Value> {
    check_arg_count("if_missing", args, 1)?;
    if current.is_null() {
        Ok(args[0].clone())
    } else {
        Ok(current.clone())
    }
}

/// A fresh v4 UUID
#[cfg(feature = "uuid")]
pub fn uuid(_current: &Value, args: &[Value]) -> EngineResult<Value> {
    check_arg_count("uuid", args, 0)?;
    Ok(Value::String(::uuid::Uuid::new_v4().to_string()))
}
