//!
//! Built-in functions for the query language
//! This module provides all built-in functions organized by category.
pub mod array;
pub mod conversion;
#[cfg(feature = "datetime")]
pub mod datetime;
pub mod math;
pub mod object;
pub mod string;
pub mod util;

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Type alias for a builtin function: the current node plus the evaluated
/// argument values.
pub type BuiltinFunction = fn(&Value, &[Value]) -> EngineResult<Value>;

/// Registry of all builtin functions
pub struct BuiltinRegistry {
    functions: HashMap<String, BuiltinFunction>,
}

impl BuiltinRegistry {
    /// Create a new builtin registry with all standard functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_string_functions();
        registry.register_math_functions();
        registry.register_array_functions();
        registry.register_object_functions();
        registry.register_conversion_functions();
        registry.register_util_functions();
        #[cfg(feature = "datetime")]
        registry.register_datetime_functions();

        registry
    }

    /// Register a builtin function
    pub fn register(&mut self, name: impl Into<String>, func: BuiltinFunction) {
        self.functions.insert(name.into(), func);
    }

    /// Call a builtin function by name
    pub fn call(&self, name: &str, current: &Value, args: &[Value]) -> EngineResult<Value> {
        let func = self
            .functions
            .get(name)
            .ok_or_else(|| EngineError::UnknownFunction(name.to_string()))?;
        func(current, args)
    }

    /// Check if a function exists
    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Get all function names
    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    fn register_string_functions(&mut self) {
        self.register("uppercase", string::uppercase);
        self.register("lowercase", string::lowercase);
        self.register("trim", string::trim);
        self.register("split", string::split);
        self.register("replace", string::replace);
        self.register("substring", string::substring);
        self.register("contains", string::contains);
        self.register("starts_with", string::starts_with);
        self.register("ends_with", string::ends_with);
        self.register("concat", string::concat);
        self.register("matches", string::matches);
        self.register("escape_xml", string::escape_xml);
        self.register("unescape_xml", string::unescape_xml);
    }

    fn register_math_functions(&mut self) {
        self.register("abs", math::abs);
        self.register("round", math::round);
        self.register("floor", math::floor);
        self.register("ceil", math::ceil);
        self.register("min", math::min);
        self.register("max", math::max);
        self.register("sqrt", math::sqrt);
        self.register("pow", math::pow);
    }

    fn register_array_functions(&mut self) {
        self.register("first", array::first);
        self.register("last", array::last);
        self.register("sort", array::sort);
        self.register("reverse", array::reverse);
        self.register("join", array::join);
        self.register("slice", array::slice);
        self.register("distinct", array::distinct);
        self.register("flatten", array::flatten);
        self.register("sum", array::sum);
        self.register("avg", array::avg);
        self.register("count", array::count);
    }

    fn register_object_functions(&mut self) {
        self.register("keys", object::keys);
        self.register("values", object::values);
        self.register("has", object::has);
        self.register("entries", object::entries);
    }

    fn register_conversion_functions(&mut self) {
        self.register("to_string", conversion::to_string);
        self.register("to_number", conversion::to_number);
        self.register("to_boolean", conversion::to_boolean);
        self.register("to_json", conversion::to_json);
        self.register("parse_json", conversion::parse_json);
    }

    fn register_util_functions(&mut self) {
        self.register("length", util::length);
        self.register("size", util::size);
        self.register("is_null", util::is_null);
        self.register("is_array", util::is_array);
        self.register("is_object", util::is_object);
        self.register("is_string", util::is_string);
        self.register("is_number", util::is_number);
        self.register("if_missing", util::if_missing);
        #[cfg(feature = "uuid")]
        self.register("uuid", util::uuid);
    }

    #[cfg(feature = "datetime")]
    fn register_datetime_functions(&mut self) {
        self.register("now", datetime::now);
        self.register("now_iso", datetime::now_iso);
        self.register("format_date", datetime::format_date);
        self.register("parse_date", datetime::parse_date);
        self.register("date_year", datetime::date_year);
        self.register("date_month", datetime::date_month);
        self.register("date_day", datetime::date_day);
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Pick the node a function operates on. A path step supplies it as the
/// current node; a statement-level call passes it as the first argument.
pub(crate) fn subject_and_args<'a>(
    current: &'a Value,
    args: &'a [Value],
) -> (&'a Value, &'a [Value]) {
    if current.is_null() && !args.is_empty() {
        (&args[0], &args[1..])
    } else {
        (current, args)
    }
}

/// Helper to check argument count
pub(crate) fn check_arg_count(func_name: &str, args: &[Value], expected: usize) -> EngineResult<()> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(EngineError::function_argument(
            func_name,
            format!("expected {} arguments, got {}", expected, args.len()),
        ))
    }
}

/// Helper to check an argument count range
pub(crate) fn check_arg_range(
    func_name: &str,
    args: &[Value],
    min: usize,
    max: usize,
) -> EngineResult<()> {
    if (min..=max).contains(&args.len()) {
        Ok(())
    } else {
        Err(EngineError::function_argument(
            func_name,
            format!(
                "expected {min} to {max} arguments, got {}",
                args.len()
            ),
        ))
    }
}

/// Helper to get a string argument with a better error message
pub(crate) fn get_string_arg<'a>(
    func_name: &str,
    args: &'a [Value],
    index: usize,
    arg_name: &str,
) -> EngineResult<&'a str> {
    args.get(index)
        .ok_or_else(|| {
            EngineError::function_argument(
                func_name,
                format!("missing argument '{arg_name}' at position {index}"),
            )
        })?
        .as_str()
        .ok_or_else(|| {
            EngineError::function_argument(
                func_name,
                format!(
                    "argument '{arg_name}' must be a string, got {}",
                    crate::value_utils::kind_name(&args[index])
                ),
            )
        })
}

/// Helper to get an integer argument with a better error message
pub(crate) fn get_int_arg(
    func_name: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> EngineResult<i64> {
    let value = args.get(index).ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!("missing argument '{arg_name}' at position {index}"),
        )
    })?;
    crate::value_utils::as_i64(value).ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "argument '{arg_name}' must be an integer, got {}",
                crate::value_utils::kind_name(value)
            ),
        )
    })
}

/// Helper to get a number argument (int or float) with a better error message
pub(crate) fn get_number_arg(
    func_name: &str,
    args: &[Value],
    index: usize,
    arg_name: &str,
) -> EngineResult<f64> {
    let value = args.get(index).ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!("missing argument '{arg_name}' at position {index}"),
        )
    })?;
    crate::value_utils::as_f64(value).ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "argument '{arg_name}' must be a number, got {}",
                crate::value_utils::kind_name(value)
            ),
        )
    })
}

/// The subject as a string, or a clear type error
pub(crate) fn require_string<'a>(func_name: &str, subject: &'a Value) -> EngineResult<&'a str> {
    subject.as_str().ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "expected a string, got {}",
                crate::value_utils::kind_name(subject)
            ),
        )
    })
}

/// The subject as an array, or a clear type error
pub(crate) fn require_array<'a>(
    func_name: &str,
    subject: &'a Value,
) -> EngineResult<&'a Vec<Value>> {
    subject.as_array().ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "expected an array, got {}",
                crate::value_utils::kind_name(subject)
            ),
        )
    })
}

/// The subject as a number, or a clear type error
pub(crate) fn require_number(func_name: &str, subject: &Value) -> EngineResult<f64> {
    crate::value_utils::as_f64(subject).ok_or_else(|| {
        EngineError::function_argument(
            func_name,
            format!(
                "expected a number, got {}",
                crate::value_utils::kind_name(subject)
            ),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_registry_dispatch() {
        let registry = BuiltinRegistry::new();
        assert!(registry.has_function("uppercase"));
        let result = registry
            .call("uppercase", &json!("hi"), &[])
            .unwrap();
        assert_eq!(result, json!("HI"));
    }

    #[test]
    fn test_unknown_function() {
        let registry = BuiltinRegistry::new();
        let error = registry.call("nope", &Value::Null, &[]).unwrap_err();
        assert!(matches!(error, EngineError::UnknownFunction(_)));
    }

    #[test]
    fn test_subject_and_args() {
        let args = [json!("text"), json!(1)];
        let (subject, rest) = subject_and_args(&Value::Null, &args);
        assert_eq!(subject, &json!("text"));
        assert_eq!(rest, &[json!(1)]);

        let current = json!("node");
        let (subject, rest) = subject_and_args(&current, &args);
        assert_eq!(subject, &json!("node"));
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_get_string_arg_type_error() {
        let args = vec![json!(42)];
        let result = get_string_arg("test_func", &args, 0, "text");
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("argument 'text' must be a string"));
        assert!(msg.contains("number"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = BuiltinRegistry::new();
        registry.register("always_seven", |_current, _args| Ok(json!(7)));
        assert_eq!(
            registry.call("always_seven", &Value::Null, &[]).unwrap(),
            json!(7)
        );
    }
}
