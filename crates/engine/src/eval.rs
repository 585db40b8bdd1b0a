//! Statement evaluation
//!
//! A statement is a flat run of operands joined by relational and logical
//! operators. Evaluation keeps two stacks, one of resolved operands and one
//! of operators; whenever the incoming operator binds no tighter than the
//! stack top, the top is reduced. Parentheses recurse into a scoped
//! sub-evaluation and unary `!` binds tightest.

use serde_json::Value;

use crate::builtins::BuiltinRegistry;
use crate::error::{EngineError, EngineResult};
use crate::matcher::{
    self, Operator, StatementToken, TernaryStep,
};
use crate::registry::{DatasetLookup, DatasetRegistry};
use crate::value_utils::{self, is_truthy_opt};
use crate::{join, path};

/// Maximum recursion depth for nested statements, paths, and predicates
pub(crate) const MAX_RECURSION_DEPTH: usize = 256;

/// Where operand paths resolve from
#[derive(Debug, Clone, Copy)]
pub(crate) enum Scope<'a> {
    /// Leading path names are dataset names in the registry
    Dataset,
    /// Paths are relative to a context node, e.g. inside an array filter.
    /// `index` is the element's position, exposed as `#`.
    Element {
        current: &'a Value,
        index: Option<usize>,
    },
}

/// Evaluates queries and statements against a dataset registry
pub(crate) struct Evaluator<'a> {
    registry: &'a DatasetRegistry,
    builtins: &'a BuiltinRegistry,
}

impl<'a> Evaluator<'a> {
    pub(crate) fn new(registry: &'a DatasetRegistry, builtins: &'a BuiltinRegistry) -> Self {
        Self { registry, builtins }
    }

    /// Evaluate a full query: a join operation or a ternary chain.
    pub(crate) fn evaluate_query(&self, query: &str) -> EngineResult<Option<Value>> {
        if let Some(join_query) = matcher::match_join(query) {
            return join::execute(self, &join_query, &mut |q| self.evaluate_query(q));
        }
        self.evaluate_steps(&matcher::decompose_ternary_steps(query))
    }

    /// Evaluate a pre-decomposed ternary chain.
    ///
    /// The result is the `if_true` of the first step whose condition is
    /// truthy and non-empty, or the trailing else statement.
    pub(crate) fn evaluate_steps(&self, steps: &[TernaryStep]) -> EngineResult<Option<Value>> {
        for step in steps {
            match &step.if_true {
                Some(if_true) => {
                    let condition = self.evaluate_statement(&step.statement, &Scope::Dataset)?;
                    if is_truthy_opt(condition.as_ref()) {
                        return self.evaluate_statement(if_true, &Scope::Dataset);
                    }
                }
                None => return self.evaluate_statement(&step.statement, &Scope::Dataset),
            }
        }
        Ok(None)
    }

    /// Evaluate one statement in the given scope
    pub(crate) fn evaluate_statement(
        &self,
        statement: &str,
        scope: &Scope<'_>,
    ) -> EngineResult<Option<Value>> {
        self.evaluate_statement_depth(statement, scope, 0)
    }

    pub(crate) fn evaluate_statement_depth(
        &self,
        statement: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> EngineResult<Option<Value>> {
        if depth > MAX_RECURSION_DEPTH {
            return Err(EngineError::Syntax(format!(
                "maximum recursion depth ({MAX_RECURSION_DEPTH}) exceeded"
            )));
        }
        let statement = statement.trim();
        if statement.is_empty() {
            return Ok(None);
        }
        let tokens = matcher::tokenize_statement(statement)?;
        let mut operands: Vec<Option<Value>> = Vec::new();
        let mut operators: Vec<Operator> = Vec::new();
        for token in tokens {
            match token {
                StatementToken::Operand(text) => {
                    operands.push(self.resolve_operand(&text, scope, depth)?);
                }
                StatementToken::Operator(op) => {
                    if op != Operator::Not {
                        while operators
                            .last()
                            .is_some_and(|top| top.precedence() >= op.precedence())
                        {
                            reduce(&mut operands, &mut operators, statement)?;
                        }
                    }
                    operators.push(op);
                }
            }
        }
        while !operators.is_empty() {
            reduce(&mut operands, &mut operators, statement)?;
        }
        match operands.len() {
            1 => Ok(operands.pop().unwrap_or(None)),
            _ => Err(EngineError::Syntax(format!(
                "malformed statement '{statement}'"
            ))),
        }
    }

    /// Resolve a single operand: literal, parenthesised sub-statement,
    /// function call, or navigation path.
    fn resolve_operand(
        &self,
        operand: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> EngineResult<Option<Value>> {
        let operand = operand.trim();
        if let Some(literal) = parse_literal(operand) {
            return Ok(literal);
        }
        if let Some(inner) = operand.strip_prefix('(') {
            let inner = inner.strip_suffix(')').ok_or_else(|| {
                EngineError::Syntax(format!("unbalanced parentheses in '{operand}'"))
            })?;
            return self.evaluate_statement_depth(inner, scope, depth + 1);
        }
        if operand == "#" {
            return Ok(match scope {
                Scope::Element {
                    index: Some(index), ..
                } => Some(Value::Number((*index as i64).into())),
                _ => None,
            });
        }
        if let Some((name, args)) = matcher::decompose_function(operand) {
            let current = match scope {
                Scope::Dataset => &Value::Null,
                Scope::Element { current, .. } => *current,
            };
            return self.call_function(current, name, args, scope, depth);
        }
        match scope {
            Scope::Element { current, .. } => path::navigate(self, current, operand, depth),
            Scope::Dataset => {
                let (name, rest) = matcher::split_dataset_name(operand);
                if name.is_empty() {
                    return Err(EngineError::Syntax(format!("invalid operand '{operand}'")));
                }
                match self.registry.lookup(name) {
                    DatasetLookup::Known(node) => {
                        if rest.is_empty() {
                            Ok(Some(node.clone()))
                        } else {
                            path::navigate(self, node, rest.trim_start_matches('.'), depth)
                        }
                    }
                    DatasetLookup::Unresolvable => Ok(None),
                    DatasetLookup::Unknown => {
                        Err(EngineError::UnresolvedDataset(name.to_string()))
                    }
                }
            }
        }
    }

    /// Invoke a builtin: arguments are sub-queries evaluated in the caller's
    /// scope, absent argument values become `null`.
    pub(crate) fn call_function(
        &self,
        current: &Value,
        name: &str,
        args: &str,
        scope: &Scope<'_>,
        depth: usize,
    ) -> EngineResult<Option<Value>> {
        let mut arg_values = Vec::new();
        for arg in matcher::split_function_args(args) {
            let value = self.evaluate_statement_depth(arg, scope, depth + 1)?;
            arg_values.push(value.unwrap_or(Value::Null));
        }
        self.builtins.call(name, current, &arg_values).map(Some)
    }
}

/// Pop one reduction off the stacks
fn reduce(
    operands: &mut Vec<Option<Value>>,
    operators: &mut Vec<Operator>,
    statement: &str,
) -> EngineResult<()> {
    let malformed = || EngineError::Syntax(format!("malformed statement '{statement}'"));
    let op = operators.pop().ok_or_else(malformed)?;
    if op == Operator::Not {
        let value = operands.pop().ok_or_else(malformed)?;
        operands.push(Some(Value::Bool(!is_truthy_opt(value.as_ref()))));
        return Ok(());
    }
    let right = operands.pop().ok_or_else(malformed)?;
    let left = operands.pop().ok_or_else(malformed)?;
    operands.push(apply_binary(op, left, right));
    Ok(())
}

/// Apply a binary operator to resolved operands
fn apply_binary(op: Operator, left: Option<Value>, right: Option<Value>) -> Option<Value> {
    match op {
        Operator::Multiply | Operator::Divide | Operator::Modulo | Operator::Add
        | Operator::Subtract => arithmetic(op, left.as_ref()?, right.as_ref()?),
        Operator::Equal
        | Operator::NotEqual
        | Operator::Greater
        | Operator::GreaterOrEqual
        | Operator::Less
        | Operator::LessOrEqual => Some(Value::Bool(compare(op, left.as_ref(), right.as_ref()))),
        Operator::And => Some(Value::Bool(
            is_truthy_opt(left.as_ref()) && is_truthy_opt(right.as_ref()),
        )),
        Operator::Or => Some(Value::Bool(
            is_truthy_opt(left.as_ref()) || is_truthy_opt(right.as_ref()),
        )),
        Operator::Not => None,
    }
}

/// Numeric arithmetic with text-to-number coercion; coercion failure and
/// division by zero propagate the neutral result.
fn arithmetic(op: Operator, left: &Value, right: &Value) -> Option<Value> {
    if let (Value::Number(l), Value::Number(r)) = (left, right)
        && let (Some(li), Some(ri)) = (l.as_i64(), r.as_i64())
        && op != Operator::Divide
    {
        let exact = match op {
            Operator::Multiply => li.checked_mul(ri),
            Operator::Modulo => {
                if ri == 0 {
                    return None;
                }
                Some(li % ri)
            }
            Operator::Add => li.checked_add(ri),
            Operator::Subtract => li.checked_sub(ri),
            _ => None,
        };
        if let Some(result) = exact {
            return Some(Value::Number(result.into()));
        }
        // overflow falls through to the float path
    }
    let lf = value_utils::as_f64(left)?;
    let rf = value_utils::as_f64(right)?;
    let result = match op {
        Operator::Multiply => lf * rf,
        Operator::Divide => {
            if rf == 0.0 {
                return None;
            }
            lf / rf
        }
        Operator::Modulo => {
            if rf == 0.0 {
                return None;
            }
            lf % rf
        }
        Operator::Add => lf + rf,
        Operator::Subtract => lf - rf,
        _ => return None,
    };
    serde_json::Number::from_f64(result).map(Value::Number)
}

/// Relational comparison following the value-model rules: lexicographic for
/// text pairs, numeric otherwise, text coerced when paired with a number,
/// container equality only for `=` and `!=`.
pub(crate) fn compare(op: Operator, left: Option<&Value>, right: Option<&Value>) -> bool {
    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    match (value_utils::is_container(left), value_utils::is_container(right)) {
        (true, true) => match op {
            Operator::Equal => containers_equal(left, right),
            Operator::NotEqual => !containers_equal(left, right),
            _ => false,
        },
        (false, false) => scalar_compare(op, left, right),
        _ => op == Operator::NotEqual,
    }
}

fn scalar_compare(op: Operator, left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, Value::Null) => matches!(
            op,
            Operator::Equal | Operator::GreaterOrEqual | Operator::LessOrEqual
        ),
        (Value::Bool(l), Value::Bool(r)) => match op {
            Operator::Equal => l == r,
            Operator::NotEqual => l != r,
            _ => false,
        },
        (Value::String(l), Value::String(r)) => match op {
            Operator::Equal => l == r,
            Operator::NotEqual => l != r,
            Operator::Greater => l > r,
            Operator::GreaterOrEqual => l >= r,
            Operator::Less => l < r,
            Operator::LessOrEqual => l <= r,
            _ => false,
        },
        (Value::Number(_), Value::Number(_)) => {
            let (Some(lf), Some(rf)) = (value_utils::as_f64(left), value_utils::as_f64(right))
            else {
                return op == Operator::NotEqual;
            };
            numeric_compare(op, lf, rf)
        }
        // Swap sides so the text side is the right operand.
        (Value::String(_), Value::Number(_)) => scalar_compare(flip(op), right, left),
        (Value::Number(_), Value::String(r)) => match r.trim().parse::<f64>() {
            Ok(rf) => {
                let Some(lf) = value_utils::as_f64(left) else {
                    return op == Operator::NotEqual;
                };
                numeric_compare(op, lf, rf)
            }
            Err(_) => op == Operator::NotEqual,
        },
        _ => op == Operator::NotEqual,
    }
}

fn numeric_compare(op: Operator, left: f64, right: f64) -> bool {
    match op {
        Operator::Equal => left == right,
        Operator::NotEqual => left != right,
        Operator::Greater => left > right,
        Operator::GreaterOrEqual => left >= right,
        Operator::Less => left < right,
        Operator::LessOrEqual => left <= right,
        _ => false,
    }
}

/// Mirror an ordering operator for swapped operands
fn flip(op: Operator) -> Operator {
    match op {
        Operator::Greater => Operator::Less,
        Operator::GreaterOrEqual => Operator::LessOrEqual,
        Operator::Less => Operator::Greater,
        Operator::LessOrEqual => Operator::GreaterOrEqual,
        other => other,
    }
}

/// Container equality: same kind and size; arrays compare as multisets of
/// value-only elements, objects compare key-wise recursively.
fn containers_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(l), Value::Array(r)) => {
            if l.len() != r.len() {
                return false;
            }
            if l.iter().chain(r.iter()).any(value_utils::is_container) {
                return false;
            }
            let mut unmatched: Vec<&Value> = r.iter().collect();
            for item in l {
                match unmatched
                    .iter()
                    .position(|&candidate| scalar_compare(Operator::Equal, item, candidate))
                {
                    Some(found) => {
                        unmatched.swap_remove(found);
                    }
                    None => return false,
                }
            }
            true
        }
        (Value::Object(l), Value::Object(r)) => {
            l.len() == r.len()
                && l.iter().all(|(key, lv)| {
                    r.get(key).is_some_and(|rv| values_equal(lv, rv))
                })
        }
        _ => false,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if value_utils::is_container(left) || value_utils::is_container(right) {
        compare(Operator::Equal, Some(left), Some(right))
    } else {
        scalar_compare(Operator::Equal, left, right)
    }
}

/// Parse a literal operand: quoted text, number, boolean, or null
fn parse_literal(operand: &str) -> Option<Option<Value>> {
    if operand.len() >= 2 && operand.starts_with('\'') && operand.ends_with('\'') {
        let inner = &operand[1..operand.len() - 1];
        return Some(Some(Value::String(inner.replace("''", "'"))));
    }
    match operand {
        "true" => return Some(Some(Value::Bool(true))),
        "false" => return Some(Some(Value::Bool(false))),
        "null" => return Some(Some(Value::Null)),
        _ => {}
    }
    if operand.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        if let Ok(i) = operand.parse::<i64>() {
            return Some(Some(Value::Number(i.into())));
        }
        if let Ok(f) = operand.parse::<f64>() {
            return Some(serde_json::Number::from_f64(f).map(Value::Number));
        }
    }
    None
}
