//! String manipulation functions

use std::collections::HashMap;
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;

use super::{check_arg_count, check_arg_range, get_int_arg, get_string_arg, require_string,
            subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::matcher;
use crate::value_utils;

/// Patterns longer than this are rejected outright
const MAX_PATTERN_LEN: usize = 512;

/// Compiled patterns kept around; the whole table is dropped once full
const PATTERN_CACHE_CAP: usize = 64;

static PATTERN_CACHE: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Convert string to uppercase
pub fn uppercase(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("uppercase", rest, 0)?;
    Ok(Value::String(require_string("uppercase", subject)?.to_uppercase()))
}

/// Convert string to lowercase
pub fn lowercase(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("lowercase", rest, 0)?;
    Ok(Value::String(require_string("lowercase", subject)?.to_lowercase()))
}

/// Trim whitespace from both ends of a string
pub fn trim(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("trim", rest, 0)?;
    Ok(Value::String(require_string("trim", subject)?.trim().to_string()))
}

/// Split a string by a delimiter
pub fn split(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("split", rest, 1)?;
    let text = require_string("split", subject)?;
    let delimiter = get_string_arg("split", rest, 0, "delimiter")?;
    let parts: Vec<Value> = text
        .split(delimiter)
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Value::Array(parts))
}

/// Replace occurrences of a substring
pub fn replace(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("replace", rest, 2)?;
    let text = require_string("replace", subject)?;
    let from = get_string_arg("replace", rest, 0, "from")?;
    let to = get_string_arg("replace", rest, 1, "to")?;
    Ok(Value::String(text.replace(from, to)))
}

/// Get a substring by character positions
pub fn substring(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_range("substring", rest, 1, 2)?;
    let text = require_string("substring", subject)?;
    let start = get_int_arg("substring", rest, 0, "start")?.max(0) as usize;
    let chars: Vec<char> = text.chars().collect();
    let end = if rest.len() > 1 {
        get_int_arg("substring", rest, 1, "end")?.max(0) as usize
    } else {
        chars.len()
    };
    let result: String = chars
        .get(start..end.min(chars.len()))
        .unwrap_or(&[])
        .iter()
        .collect();
    Ok(Value::String(result))
}

/// Check if string contains a substring
pub fn contains(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("contains", rest, 1)?;
    let text = require_string("contains", subject)?;
    let needle = get_string_arg("contains", rest, 0, "needle")?;
    Ok(Value::Bool(text.contains(needle)))
}

/// Check if string starts with a prefix
pub fn starts_with(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("starts_with", rest, 1)?;
    let text = require_string("starts_with", subject)?;
    let prefix = get_string_arg("starts_with", rest, 0, "prefix")?;
    Ok(Value::Bool(text.starts_with(prefix)))
}

/// Check if string ends with a suffix
pub fn ends_with(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("ends_with", rest, 1)?;
    let text = require_string("ends_with", subject)?;
    let suffix = get_string_arg("ends_with", rest, 0, "suffix")?;
    Ok(Value::Bool(text.ends_with(suffix)))
}

/// Concatenate the text forms of all arguments; null arguments are skipped
pub fn concat(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let parts = if args.is_empty() {
        std::slice::from_ref(current)
    } else {
        args
    };
    let mut result = String::new();
    for part in parts {
        if !part.is_null() {
            result.push_str(&value_utils::text_form(part));
        }
    }
    Ok(Value::String(result))
}

/// Escape the five XML entities
pub fn escape_xml(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("escape_xml", rest, 0)?;
    Ok(Value::String(matcher::xml_escape(require_string(
        "escape_xml",
        subject,
    )?)))
}

/// Decode XML entities and numeric character references
pub fn unescape_xml(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("unescape_xml", rest, 0)?;
    Ok(Value::String(matcher::xml_unescape(require_string(
        "unescape_xml",
        subject,
    )?)))
}

/// Regex match against the subject text.
///
/// A pattern is rejected when it exceeds `MAX_PATTERN_LEN` or when a
/// quantified group itself contains a quantifier, the shape behind
/// catastrophic backtracking. Compiled patterns are cached per process.
pub fn matches(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("matches", rest, 1)?;
    let text = require_string("matches", subject)?;
    let pattern = get_string_arg("matches", rest, 0, "pattern")?;

    if pattern.len() > MAX_PATTERN_LEN {
        return Err(EngineError::function_argument(
            "matches",
            format!("pattern exceeds {MAX_PATTERN_LEN} characters"),
        ));
    }
    if has_nested_quantifier(pattern) {
        return Err(EngineError::function_argument(
            "matches",
            "pattern repeats a group that already contains a quantifier",
        ));
    }

    let regex = {
        let mut cache = PATTERN_CACHE.lock();
        match cache.get(pattern) {
            Some(compiled) => compiled.clone(),
            None => {
                let compiled = Regex::new(pattern)
                    .map_err(|e| EngineError::function_argument("matches", e.to_string()))?;
                if cache.len() >= PATTERN_CACHE_CAP {
                    cache.clear();
                }
                cache.insert(pattern.to_string(), compiled.clone());
                compiled
            }
        }
    };

    Ok(Value::Bool(regex.is_match(text)))
}

/// Detect patterns like `(a+)*` where a repetition applies to a group
/// whose body already repeats. One bool per open group records whether a
/// quantifier was seen inside it; when a quantifier immediately follows a
/// closed group carrying that mark, the pattern is flagged.
fn has_nested_quantifier(pattern: &str) -> bool {
    let mut group_has_quantifier = vec![false];
    let mut after_marked_group = false;
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
                after_marked_group = false;
            }
            '(' => {
                group_has_quantifier.push(false);
                after_marked_group = false;
            }
            ')' => {
                let marked = group_has_quantifier.pop().unwrap_or(false);
                if marked && let Some(enclosing) = group_has_quantifier.last_mut() {
                    *enclosing = true;
                }
                after_marked_group = marked;
            }
            '*' | '+' | '{' => {
                if after_marked_group {
                    return true;
                }
                if let Some(level) = group_has_quantifier.last_mut() {
                    *level = true;
                }
                after_marked_group = false;
            }
            _ => after_marked_group = false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_case_functions() {
        assert_eq!(uppercase(&json!("hi"), &[]).unwrap(), json!("HI"));
        assert_eq!(lowercase(&Value::Null, &[json!("HI")]).unwrap(), json!("hi"));
    }

    #[test]
    fn test_split_and_substring() {
        assert_eq!(
            split(&json!("a,b,c"), &[json!(",")]).unwrap(),
            json!(["a", "b", "c"])
        );
        assert_eq!(
            substring(&json!("hello"), &[json!(1), json!(3)]).unwrap(),
            json!("el")
        );
        assert_eq!(substring(&json!("hello"), &[json!(3)]).unwrap(), json!("lo"));
    }

    #[test]
    fn test_concat_skips_null() {
        assert_eq!(
            concat(&Value::Null, &[json!("a"), Value::Null, json!(3)]).unwrap(),
            json!("a3")
        );
    }

    #[test]
    fn test_xml_escaping() {
        assert_eq!(
            escape_xml(&json!("a<b&c"), &[]).unwrap(),
            json!("a&lt;b&amp;c")
        );
        assert_eq!(
            unescape_xml(&json!("a&lt;b&amp;c"), &[]).unwrap(),
            json!("a<b&c")
        );
    }

    #[test]
    fn test_matches() {
        assert_eq!(
            matches(&json!("hello world"), &[json!("hello.*")]).unwrap(),
            json!(true)
        );
        assert_eq!(
            matches(&json!("goodbye"), &[json!("^hello")]).unwrap(),
            json!(false)
        );
    }

    #[test]
    fn test_matches_rejects_dangerous_patterns() {
        assert!(matches(&json!("aaaa!"), &[json!("(a+)+$")]).is_err());
        let long_pattern = "a".repeat(MAX_PATTERN_LEN + 1);
        assert!(matches(&json!("x"), &[json!(long_pattern)]).is_err());
    }

    #[test]
    fn test_nested_quantifier_detection() {
        assert!(has_nested_quantifier("(a+)+"));
        assert!(has_nested_quantifier("(a*)*"));
        assert!(has_nested_quantifier("([a-z]+)*"));
        assert!(has_nested_quantifier("(a{2,})+"));
        assert!(has_nested_quantifier("((a+)b)*"));
        assert!(!has_nested_quantifier("hello.*"));
        assert!(!has_nested_quantifier("(abc)+"));
        assert!(!has_nested_quantifier("a+b+c+"));
        assert!(!has_nested_quantifier("(a+)b*"));
        assert!(!has_nested_quantifier(r"\(a+\)+"));
    }

    #[test]
    fn test_type_errors() {
        assert!(uppercase(&json!(5), &[]).is_err());
        assert!(split(&json!("a"), &[]).is_err());
    }
}
