//! Array manipulation functions

use serde_json::Value;

use super::{check_arg_count, check_arg_range, get_int_arg, require_array, subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::eval;
use crate::matcher::Operator;
use crate::value_utils;

/// First element of the subject array
pub fn first(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("first", rest, 0)?;
    let elements = require_array("first", subject)?;
    elements
        .first()
        .cloned()
        .ok_or_else(|| EngineError::function_argument("first", "array is empty"))
}

/// Last element of the subject array
pub fn last(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("last", rest, 0)?;
    let elements = require_array("last", subject)?;
    elements
        .last()
        .cloned()
        .ok_or_else(|| EngineError::function_argument("last", "array is empty"))
}

/// Sort an array of values; numbers numerically, text lexicographically
pub fn sort(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("sort", rest, 0)?;
    let mut elements = require_array("sort", subject)?.clone();
    elements.sort_by(|a, b| match (a, b) {
        (Value::Number(_), Value::Number(_)) => {
            let x = value_utils::as_f64(a).unwrap_or(0.0);
            let y = value_utils::as_f64(b).unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => std::cmp::Ordering::Equal,
    });
    Ok(Value::Array(elements))
}

/// Reverse an array
pub fn reverse(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("reverse", rest, 0)?;
    let mut elements = require_array("reverse", subject)?.clone();
    elements.reverse();
    Ok(Value::Array(elements))
}

/// Join element text forms with a separator (default empty)
pub fn join(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_range("join", rest, 0, 1)?;
    let elements = require_array("join", subject)?;
    let separator = match rest.first() {
        Some(Value::String(s)) => s.clone(),
        Some(other) => value_utils::text_form(other),
        None => String::new(),
    };
    let joined = elements
        .iter()
        .filter(|element| !element.is_null())
        .map(value_utils::text_form)
        .collect::<Vec<_>>()
        .join(&separator);
    Ok(Value::String(joined))
}

/// Slice an array by element positions
pub fn slice(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_range("slice", rest, 1, 2)?;
    let elements = require_array("slice", subject)?;
    let start = get_int_arg("slice", rest, 0, "start")?.max(0) as usize;
    let end = if rest.len() > 1 {
        get_int_arg("slice", rest, 1, "end")?.max(0) as usize
    } else {
        elements.len()
    };
    let result: Vec<Value> = elements
        .get(start..end.min(elements.len()))
        .unwrap_or(&[])
        .to_vec();
    Ok(Value::Array(result))
}

/// Remove duplicate elements, keeping first occurrences
pub fn distinct(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("distinct", rest, 0)?;
    let elements = require_array("distinct", subject)?;
    let mut result: Vec<Value> = Vec::with_capacity(elements.len());
    for element in elements {
        let already = result
            .iter()
            .any(|kept| eval::compare(Operator::Equal, Some(kept), Some(element)));
        if !already {
            result.push(element.clone());
        }
    }
    Ok(Value::Array(result))
}

/// Flatten one level of nesting
pub fn flatten(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("flatten", rest, 0)?;
    let elements = require_array("flatten", subject)?;
    let result: Vec<Value> = elements
        .iter()
        .flat_map(|element| match element.as_array() {
            Some(inner) => inner.clone(),
            None => vec![element.clone()],
        })
        .collect();
    Ok(Value::Array(result))
}

/// Sum of the numeric elements
pub fn sum(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("sum", rest, 0)?;
    numeric_fold("sum", subject).map(|(total, _)| serde_json::json!(total))
}

/// Average of the numeric elements
pub fn avg(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("avg", rest, 0)?;
    let (total, count) = numeric_fold("avg", subject)?;
    if count == 0 {
        return Err(EngineError::function_argument("avg", "array is empty"));
    }
    Ok(serde_json::json!(total / count as f64))
}

/// Number of elements
pub fn count(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("count", rest, 0)?;
    let elements = require_array("count", subject)?;
    Ok(Value::Number((elements.len() as i64).into()))
}

fn numeric_fold(func_name: &str, subject: &Value) -> EngineResult<(f64, usize)> {
    let elements = require_array(func_name, subject)?;
    let mut total = 0.0;
    let mut counted = 0;
    for (position, element) in elements.iter().enumerate() {
        let value = value_utils::as_f64(element).ok_or_else(|| {
            EngineError::function_argument(
                func_name,
                format!("element at position {position} is not a number"),
            )
        })?;
        total += value;
        counted += 1;
    }
    Ok((total, counted))
}
