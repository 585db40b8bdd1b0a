//! Path navigation over JSON nodes
//!
//! A path is a run of dot-separated steps. A name step fetches a field from
//! an object, or maps itself across an array. A filter step
//! `name[predicate]mode` evaluates the predicate once per element with the
//! element as context and `#` bound to its index. A function step invokes a
//! builtin on the current node.
//!
//! Divert-all (`@`) marks the produced array so every later step maps
//! element-wise; collect-all (`*`) hands later steps the whole array.

use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::eval::{Evaluator, MAX_RECURSION_DEPTH, Scope};
use crate::matcher::{self, FilterMode};
use crate::value_utils::is_truthy_opt;

/// Navigate from `root` along `path`; `None` when any step finds nothing
pub(crate) fn navigate(
    ev: &Evaluator<'_>,
    root: &Value,
    path: &str,
    depth: usize,
) -> EngineResult<Option<Value>> {
    if depth > MAX_RECURSION_DEPTH {
        return Err(EngineError::Syntax(format!(
            "maximum recursion depth ({MAX_RECURSION_DEPTH}) exceeded"
        )));
    }
    let mut value = root.clone();
    let mut diverted = false;
    for step in matcher::split_path_steps(path) {
        if diverted {
            let Value::Array(elements) = &value else {
                return Ok(None);
            };
            let mut results = Vec::with_capacity(elements.len());
            for element in elements {
                let (resolved, _) = apply_step(ev, element, step, depth)?;
                if let Some(node) = resolved {
                    results.push(node);
                }
            }
            value = Value::Array(results);
        } else {
            match apply_step(ev, &value, step, depth)? {
                (Some(node), divert) => {
                    value = node;
                    diverted = divert;
                }
                (None, _) => return Ok(None),
            }
        }
    }
    Ok(Some(value))
}

/// Apply one step to one node; the flag reports divert-all
fn apply_step(
    ev: &Evaluator<'_>,
    value: &Value,
    step: &str,
    depth: usize,
) -> EngineResult<(Option<Value>, bool)> {
    if let Some((name, args)) = matcher::decompose_function(step) {
        let scope = Scope::Element {
            current: value,
            index: None,
        };
        return Ok((ev.call_function(value, name, args, &scope, depth)?, false));
    }
    let parsed = matcher::parse_filter_step(step)?;
    let resolved = if parsed.name.is_empty() {
        Some(value.clone())
    } else {
        name_step(value, parsed.name)
    };
    let Some(predicate) = parsed.predicate else {
        return Ok((resolved, false));
    };
    let Some(target) = resolved else {
        return Ok((None, false));
    };
    // An object (or value) filters as a one-element array.
    let rows = match target {
        Value::Array(elements) => elements,
        other => vec![other],
    };
    let selected = filter_rows(ev, &rows, predicate, parsed.mode, depth)?;
    Ok((selected, parsed.mode == FilterMode::DivertAll))
}

/// Fetch a field: objects directly, arrays map the fetch across elements
/// with missing results omitted.
fn name_step(value: &Value, name: &str) -> Option<Value> {
    match value {
        Value::Object(fields) => fields.get(name).cloned(),
        Value::Array(elements) => {
            let results: Vec<Value> = elements
                .iter()
                .filter_map(|element| element.as_object()?.get(name).cloned())
                .collect();
            Some(Value::Array(results))
        }
        _ => None,
    }
}

/// Select rows by predicate, honouring the filter mode.
///
/// A predicate that parses as an integer is positional; negative indexes
/// count from the end.
pub(crate) fn filter_rows(
    ev: &Evaluator<'_>,
    rows: &[Value],
    predicate: &str,
    mode: FilterMode,
    depth: usize,
) -> EngineResult<Option<Value>> {
    if let Ok(position) = predicate.trim().parse::<i64>() {
        let index = if position < 0 {
            rows.len() as i64 + position
        } else {
            position
        };
        let element = usize::try_from(index).ok().and_then(|i| rows.get(i));
        return Ok(match mode {
            FilterMode::First => element.cloned(),
            FilterMode::CollectAll | FilterMode::DivertAll => {
                Some(Value::Array(element.cloned().into_iter().collect()))
            }
        });
    }
    let mut matches = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let scope = Scope::Element {
            current: row,
            index: Some(index),
        };
        let verdict = ev.evaluate_statement_depth(predicate, &scope, depth + 1)?;
        if is_truthy_opt(verdict.as_ref()) {
            if mode == FilterMode::First {
                return Ok(Some(row.clone()));
            }
            matches.push(row.clone());
        }
    }
    Ok(match mode {
        FilterMode::First => None,
        FilterMode::CollectAll | FilterMode::DivertAll => Some(Value::Array(matches)),
    })
}
