//! Relational joins between JSON container nodes
//!
//! Five operators: inner-one `>=<`, left-one `<=<`, right-one `>=>`,
//! left-many `<=<<`, right-many `>>=>`. The right-* forms normalise to
//! their left-* twin by swapping sides. Matching is driven by a synthetic
//! `key=value [& ...]` predicate evaluated against the right-side rows with
//! first mode (one) or collect-all mode (many).

use serde_json::Value;
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::eval::Evaluator;
use crate::matcher::{self, FilterMode, JoinOperator, JoinQuery, JoinSide};
use crate::path;
use crate::value_utils;

/// Evaluate both sides of a join and build the joined container.
///
/// `eval_side` supplies side-query evaluation so the caller decides whether
/// sub-queries go through the plain evaluator or the resolution loop.
pub(crate) fn execute(
    ev: &Evaluator<'_>,
    join: &JoinQuery,
    eval_side: &mut dyn FnMut(&str) -> EngineResult<Option<Value>>,
) -> EngineResult<Option<Value>> {
    // Normalise the right-* operators to their left-* twin.
    let (operator, left_side, right_side) = match join.operator {
        JoinOperator::RightJoinOne => (JoinOperator::LeftJoinOne, &join.right, &join.left),
        JoinOperator::RightJoinMany => (JoinOperator::LeftJoinMany, &join.right, &join.left),
        op => (op, &join.left, &join.right),
    };
    if left_side.keys.len() != right_side.keys.len() {
        return Err(EngineError::InvalidArgument(format!(
            "join key counts do not match: {} vs {}",
            left_side.keys.len(),
            right_side.keys.len()
        )));
    }

    let left_value = resolve_side(&left_side.query, eval_side)?;
    let right_value = resolve_side(&right_side.query, eval_side)?;

    let (array_field, right_keys) = split_array_field(right_side);
    let mut plan = JoinPlan {
        operator,
        left_keys: left_side.keys.clone(),
        right_keys,
        array_field: array_field
            .unwrap_or_else(|| derive_array_field(&right_side.query)),
        left: left_value,
        right: right_value,
    };

    // Inner-one is symmetric; flip so iteration runs over the array side.
    if plan.operator == JoinOperator::InnerJoinOne
        && plan.left.is_object()
        && plan.right.is_array()
    {
        std::mem::swap(&mut plan.left, &mut plan.right);
        std::mem::swap(&mut plan.left_keys, &mut plan.right_keys);
    }

    debug!(
        operator = ?plan.operator,
        array_field = plan.array_field.as_str(),
        "executing join"
    );
    plan.run(ev)
}

fn resolve_side(
    query: &str,
    eval_side: &mut dyn FnMut(&str) -> EngineResult<Option<Value>>,
) -> EngineResult<Value> {
    match eval_side(query)? {
        Some(node) if value_utils::is_container(&node) => Ok(node),
        Some(node) => Err(EngineError::InvalidArgument(format!(
            "join operand '{query}' resolves to a {}, not a container",
            value_utils::kind_name(&node)
        ))),
        None => Err(EngineError::InvalidArgument(format!(
            "join operand '{query}' resolves to nothing"
        ))),
    }
}

struct JoinPlan {
    operator: JoinOperator,
    left_keys: Vec<String>,
    right_keys: Vec<String>,
    array_field: String,
    left: Value,
    right: Value,
}

impl JoinPlan {
    fn run(&self, ev: &Evaluator<'_>) -> EngineResult<Option<Value>> {
        let right_rows: Vec<Value> = match &self.right {
            Value::Array(elements) => elements.clone(),
            other => vec![other.clone()],
        };
        let (left_rows, single) = match &self.left {
            Value::Array(elements) => (elements.clone(), false),
            other => (vec![other.clone()], true),
        };

        let mut results = Vec::with_capacity(left_rows.len());
        for row in left_rows {
            if let Some(joined) = self.join_row(ev, row, &right_rows)? {
                results.push(joined);
            }
        }
        if single {
            return Ok(results.into_iter().next());
        }
        Ok(Some(Value::Array(results)))
    }

    /// Join one left row; `None` drops the row (unmatched inner join)
    fn join_row(
        &self,
        ev: &Evaluator<'_>,
        row: Value,
        right_rows: &[Value],
    ) -> EngineResult<Option<Value>> {
        let Some(predicate) = self.match_predicate(ev, &row)? else {
            // a key navigated to nothing usable
            return Ok(match self.operator {
                JoinOperator::InnerJoinOne => None,
                _ => Some(row),
            });
        };
        match self.operator {
            JoinOperator::InnerJoinOne | JoinOperator::LeftJoinOne => {
                let matched =
                    path::filter_rows(ev, right_rows, &predicate, FilterMode::First, 0)?;
                match matched {
                    Some(Value::Object(fields)) => {
                        let mut joined = row;
                        if let Value::Object(target) = &mut joined {
                            for (key, value) in fields {
                                target.insert(key, value);
                            }
                            Ok(Some(joined))
                        } else {
                            // left row is not an object; nothing to overlay
                            Ok(match self.operator {
                                JoinOperator::InnerJoinOne => None,
                                _ => Some(joined),
                            })
                        }
                    }
                    _ => Ok(match self.operator {
                        JoinOperator::InnerJoinOne => None,
                        _ => Some(row),
                    }),
                }
            }
            JoinOperator::LeftJoinMany => {
                let matched =
                    path::filter_rows(ev, right_rows, &predicate, FilterMode::CollectAll, 0)?
                        .unwrap_or_else(|| Value::Array(Vec::new()));
                let mut joined = row;
                if let Value::Object(target) = &mut joined {
                    target.insert(self.array_field.clone(), matched);
                }
                Ok(Some(joined))
            }
            // normalised away before the plan is built
            JoinOperator::RightJoinOne | JoinOperator::RightJoinMany => {
                Err(EngineError::InvalidArgument(
                    "right join was not normalised".to_string(),
                ))
            }
        }
    }

    /// Build `rightKey=leftValue` terms joined by `&`; `None` when a left
    /// key value is absent or a container.
    fn match_predicate(
        &self,
        ev: &Evaluator<'_>,
        row: &Value,
    ) -> EngineResult<Option<String>> {
        let mut terms = Vec::with_capacity(self.left_keys.len());
        for (left_key, right_key) in self.left_keys.iter().zip(&self.right_keys) {
            let key_value = path::navigate(ev, row, left_key, 0)?;
            let Some(key_value) = key_value else {
                return Ok(None);
            };
            if value_utils::is_container(&key_value) {
                return Ok(None);
            }
            terms.push(format!("{right_key}={}", quote_value(&key_value)));
        }
        Ok(Some(terms.join(" & ")))
    }
}

/// Literal form of a key value inside a synthetic predicate; text gets
/// single quotes with inner quotes doubled.
fn quote_value(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{}'", text.replace('\'', "''")),
        other => value_utils::text_form(other),
    }
}

/// Split an `arrayField:key` prefix off the first right key
fn split_array_field(side: &JoinSide) -> (Option<String>, Vec<String>) {
    let mut keys = side.keys.clone();
    if let Some(first) = keys.first_mut()
        && let Some((field, key)) = first.split_once(':')
    {
        let field = field.trim().to_string();
        *first = key.trim().to_string();
        return (Some(field), keys);
    }
    (None, keys)
}

/// Default embedding field: the identifier of the query's last path step
fn derive_array_field(query: &str) -> String {
    let last = matcher::split_path_steps(query).pop().unwrap_or(query);
    let end = last
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(last.len());
    last[..end].to_string()
}
