//! Date and time functions
//!
//! Timestamps are interchangeable between epoch milliseconds and RFC 3339
//! text; `parse_date` additionally accepts the common `%Y-%m-%d` forms.

use std::fmt::Write as _;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use super::{check_arg_count, check_arg_range, get_string_arg, subject_and_args};
use crate::error::{EngineError, EngineResult};
use crate::value_utils;

/// Current time as epoch milliseconds
pub fn now(_current: &Value, args: &[Value]) -> EngineResult<Value> {
    check_arg_count("now", args, 0)?;
    Ok(Value::Number(Utc::now().timestamp_millis().into()))
}

/// Current time as RFC 3339 text
pub fn now_iso(_current: &Value, args: &[Value]) -> EngineResult<Value> {
    check_arg_count("now_iso", args, 0)?;
    Ok(Value::String(Utc::now().to_rfc3339()))
}

/// Format a timestamp with a strftime pattern
pub fn format_date(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count("format_date", rest, 1)?;
    let timestamp = parse_timestamp("format_date", subject)?;
    let pattern = get_string_arg("format_date", rest, 0, "pattern")?;
    let mut formatted = String::new();
    write!(formatted, "{}", timestamp.format(pattern)).map_err(|_| {
        EngineError::function_argument("format_date", format!("invalid pattern '{pattern}'"))
    })?;
    Ok(Value::String(formatted))
}

/// Parse a date into epoch milliseconds
pub fn parse_date(current: &Value, args: &[Value]) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_range("parse_date", rest, 0, 1)?;
    let timestamp = if rest.is_empty() {
        parse_timestamp("parse_date", subject)?
    } else {
        let pattern = get_string_arg("parse_date", rest, 0, "pattern")?;
        let text = subject.as_str().ok_or_else(|| {
            EngineError::function_argument("parse_date", "expected a string to parse")
        })?;
        parse_with_pattern(text, pattern)?
    };
    Ok(Value::Number(timestamp.timestamp_millis().into()))
}

/// Calendar year of a timestamp
pub fn date_year(current: &Value, args: &[Value]) -> EngineResult<Value> {
    date_part(current, args, "date_year", |ts| {
        i64::from(chrono::Datelike::year(ts))
    })
}

/// Calendar month (1-12) of a timestamp
pub fn date_month(current: &Value, args: &[Value]) -> EngineResult<Value> {
    date_part(current, args, "date_month", |ts| {
        i64::from(chrono::Datelike::month(ts))
    })
}

/// Day of month (1-31) of a timestamp
pub fn date_day(current: &Value, args: &[Value]) -> EngineResult<Value> {
    date_part(current, args, "date_day", |ts| {
        i64::from(chrono::Datelike::day(ts))
    })
}

fn date_part(
    current: &Value,
    args: &[Value],
    func_name: &str,
    part: fn(&DateTime<Utc>) -> i64,
) -> EngineResult<Value> {
    let (subject, rest) = subject_and_args(current, args);
    check_arg_count(func_name, rest, 0)?;
    let timestamp = parse_timestamp(func_name, subject)?;
    Ok(Value::Number(part(&timestamp).into()))
}

/// Interpret a value as a UTC timestamp
fn parse_timestamp(func_name: &str, value: &Value) -> EngineResult<DateTime<Utc>> {
    match value {
        Value::Number(_) => value_utils::as_i64(value)
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| {
                EngineError::function_argument(func_name, "timestamp out of range")
            }),
        Value::String(text) => parse_text_timestamp(text).ok_or_else(|| {
            EngineError::function_argument(func_name, format!("cannot parse date '{text}'"))
        }),
        other => Err(EngineError::function_argument(
            func_name,
            format!(
                "expected a timestamp, got {}",
                value_utils::kind_name(other)
            ),
        )),
    }
}

fn parse_text_timestamp(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S") {
        return Some(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(parsed.and_hms_opt(0, 0, 0)?.and_utc());
    }
    None
}

fn parse_with_pattern(text: &str, pattern: &str) -> EngineResult<DateTime<Utc>> {
    if let Ok(parsed) = NaiveDateTime::parse_from_str(text, pattern) {
        return Ok(parsed.and_utc());
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(text, pattern) {
        if let Some(at_midnight) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(at_midnight.and_utc());
        }
    }
    Err(EngineError::function_argument(
        "parse_date",
        format!("cannot parse '{text}' with pattern '{pattern}'"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_date() {
        // 2021-03-02T00:00:00Z
        let millis = json!(1_614_643_200_000_i64);
        assert_eq!(
            format_date(&millis, &[json!("%Y-%m-%d")]).unwrap(),
            json!("2021-03-02")
        );
    }

    #[test]
    fn test_parse_date_forms() {
        assert_eq!(
            parse_date(&json!("2021-03-02"), &[]).unwrap(),
            json!(1_614_643_200_000_i64)
        );
        assert_eq!(
            parse_date(&json!("2021-03-02T00:00:00Z"), &[]).unwrap(),
            json!(1_614_643_200_000_i64)
        );
        assert_eq!(
            parse_date(&json!("02/03/2021"), &[json!("%d/%m/%Y")]).unwrap(),
            json!(1_614_643_200_000_i64)
        );
    }

    #[test]
    fn test_date_parts() {
        let millis = json!(1_614_643_200_000_i64);
        assert_eq!(date_year(&millis, &[]).unwrap(), json!(2021));
        assert_eq!(date_month(&millis, &[]).unwrap(), json!(3));
        assert_eq!(date_day(&millis, &[]).unwrap(), json!(2));
    }

    #[test]
    fn test_now_is_plausible() {
        let result = now(&Value::Null, &[]).unwrap();
        // after 2020-01-01
        assert!(result.as_i64().unwrap() > 1_577_836_800_000);
        let iso = now_iso(&Value::Null, &[]).unwrap();
        assert!(iso.as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_invalid_input() {
        assert!(parse_date(&json!("not a date"), &[]).is_err());
        assert!(format_date(&json!(true), &[json!("%Y")]).is_err());
    }
}
