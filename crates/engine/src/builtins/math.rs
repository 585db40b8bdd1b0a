//! Math functions

use serde_json::Value;

use super::{check_arg_count, check_arg_range, get_int_arg, get_number_arg, require_number,
            subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::value_utils;

/// Absolute value
pub fn abs(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("abs", rest, 0)?;
    Ok(serde_json::json!(require_number("abs", subject)?.abs()))
}

/// Round to the given number of decimal places (default 0)
pub fn round(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_range("round", rest, 0, 1)?;
    let num = require_number("round", subject)?;
    if rest.is_empty() {
        Ok(serde_json::json!(num.round()))
    } else {
        let decimals = get_int_arg("round", rest, 0, "decimals")?.max(0) as u32;
        let multiplier = 10_f64.powi(decimals as i32);
        Ok(serde_json::json!((num * multiplier).round() / multiplier))
    }
}

/// Floor function
pub fn floor(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("floor", rest, 0)?;
    Ok(serde_json::json!(require_number("floor", subject)?.floor()))
}

/// Ceiling function
pub fn ceil(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("ceil", rest, 0)?;
    Ok(serde_json::json!(require_number("ceil", subject)?.ceil()))
}

/// Minimum over the arguments, or over the subject array
pub fn min(current: &Value, args: &[Value]) -> EngineResult<Value> {
    fold_extreme("min", current, args, |best, candidate| candidate < best)
}

/// Maximum over the arguments, or over the subject array
pub fn max(current: &Value, args: &[Value]) -> EngineResult<Value> {
    fold_extreme("max", current, args, |best, candidate| candidate > best)
}

fn fold_extreme(
    func_name: &str,
    current: &Value,
    args: &[Value],
    wins: fn(f64, f64) -> bool,
) -> EngineResult<Value> {
    let candidates: &[Value] = if args.is_empty() {
        match current {
            Value::Array(elements) => elements,
            other => std::slice::from_ref(other),
        }
    } else {
        args
    };
    let mut best: Option<f64> = None;
    for (position, candidate) in candidates.iter().enumerate() {
        let value = value_utils::as_f64(candidate).ok_or_else(|| {
            EngineError::function_argument(
                func_name,
                format!("argument at position {position} must be a number"),
            )
        })?;
        best = Some(match best {
            Some(current_best) if !wins(current_best, value) => current_best,
            _ => value,
        });
    }
    let best = best.ok_or_else(|| {
        EngineError::function_argument(func_name, "expected at least one number")
    })?;
    Ok(serde_json::json!(best))
}

/// Square root
pub fn sqrt(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("sqrt", rest, 0)?;
    let num = require_number("sqrt", subject)?;
    if num < 0.0 {
        return Err(EngineError::function_argument(
            "sqrt",
            "cannot take square root of negative number",
        ));
    }
    Ok(serde_json::json!(num.sqrt()))
}

/// Power function
pub fn pow(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("pow", rest, 1)?;
    let base = require_number("pow", subject)?;
    let exponent = get_number_arg("pow", rest, 0, "exponent")?;
    Ok(serde_json::json!(base.powf(exponent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rounding_family() {
        assert_eq!(round(&json!(2.567), &[]).unwrap(), json!(3.0));
        assert_eq!(round(&json!(2.567), &[json!(2)]).unwrap(), json!(2.57));
        assert_eq!(floor(&json!(2.9), &[]).unwrap(), json!(2.0));
        assert_eq!(ceil(&json!(2.1), &[]).unwrap(), json!(3.0));
    }

    #[test]
    fn test_min_max_variadic_and_array() {
        assert_eq!(min(&Value::Null, &[json!(3), json!(1), json!(2)]).unwrap(), json!(1.0));
        assert_eq!(max(&json!([3, 1, 2]), &[]).unwrap(), json!(3.0));
    }

    #[test]
    fn test_abs_pow_sqrt() {
        assert_eq!(abs(&json!(-4), &[]).unwrap(), json!(4.0));
        assert_eq!(pow(&json!(2), &[json!(10)]).unwrap(), json!(1024.0));
        assert_eq!(sqrt(&json!(9), &[]).unwrap(), json!(3.0));
        assert!(sqrt(&json!(-1), &[]).is_err());
    }

    #[test]
    fn test_string_coercion() {
        assert_eq!(abs(&json!("-2.5"), &[]).unwrap(), json!(2.5));
    }
}
