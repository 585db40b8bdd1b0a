//! Placeholder scanning and single-round template substitution
//!
//! One pass walks the template left to right, extracts every `{{...}}`
//! region, evaluates the inner query, and appends the outcome. A clean pass
//! recurses on its own output (resolved values may themselves contain
//! placeholders) until a fixpoint; any failure stops after the pass so the
//! resolution driver can act on the collected names.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

use crate::builtins::BuiltinRegistry;
use crate::error_formatter::format_template_error;
use crate::eval::Evaluator;
use crate::matcher;
use crate::registry::DatasetRegistry;
use crate::value_utils;

/// Maximum number of placeholders evaluated in a single pass
pub(crate) const MAX_TEMPLATE_EXPRESSIONS: usize = 1000;

/// Maximum substitution rounds before a merge settles for what it has.
/// A resolved value may re-introduce its own placeholder with extra text
/// around it, which never reaches the fixpoint.
const MAX_SUBSTITUTION_ROUNDS: usize = 64;

/// Position in the template (line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// Line number (1-based)
    pub line: usize,
    /// Column number (1-based)
    pub column: usize,
    /// Absolute character offset (0-based)
    pub offset: usize,
}

impl Position {
    /// Locate a byte offset within a text
    pub(crate) fn at(text: &str, offset: usize) -> Self {
        let prefix = &text[..offset.min(text.len())];
        let line = prefix.matches('\n').count() + 1;
        let column = prefix
            .rsplit_once('\n')
            .map_or(prefix.chars().count(), |(_, tail)| tail.chars().count())
            + 1;
        Self {
            line,
            column,
            offset,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Everything a failed pass reports to the resolution driver.
///
/// `names` keeps first-report order; the driver processes them in exactly
/// this order within a round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FillFailure {
    pub names: Vec<String>,
    pub placeholders: Vec<String>,
    pub partial: String,
}

/// Run substitution passes until a fixpoint or the first failing pass
pub(crate) fn fill_in_placeholder_loop(
    datasets: &mut DatasetRegistry,
    builtins: &BuiltinRegistry,
    template: &str,
    xml: bool,
) -> Result<String, FillFailure> {
    let mut text = template.to_string();
    for _ in 0..MAX_SUBSTITUTION_ROUNDS {
        let pass = fill_pass(datasets, builtins, &text, xml);
        if !pass.found_any {
            // fast path: nothing to substitute, hand back the text untouched
            return Ok(text);
        }
        if !pass.names.is_empty() || !pass.placeholders.is_empty() {
            return Err(FillFailure {
                names: pass.names,
                placeholders: pass.placeholders,
                partial: pass.output,
            });
        }
        if pass.output == text {
            return Ok(pass.output);
        }
        text = pass.output;
    }
    Ok(text)
}

struct FillPass {
    output: String,
    names: Vec<String>,
    placeholders: Vec<String>,
    found_any: bool,
}

/// One linear scan over the template
fn fill_pass(
    datasets: &mut DatasetRegistry,
    builtins: &BuiltinRegistry,
    template: &str,
    xml: bool,
) -> FillPass {
    let mut output = String::with_capacity(template.len());
    let mut names: Vec<String> = Vec::new();
    let mut placeholders: Vec<String> = Vec::new();
    let mut found_any = false;
    let mut seen = 0usize;
    let mut rest = template;
    loop {
        let Some(open) = rest.find("{{") else {
            output.push_str(rest);
            break;
        };
        // The opener is the last `{{` of a brace run; braces before it are
        // literal text.
        let run_end = rest[open..]
            .find(|c: char| c != '{')
            .map_or(rest.len(), |d| open + d);
        output.push_str(&rest[..run_end - 2]);
        let inner_start = run_end;
        found_any = true;
        seen += 1;

        let Some(close) = rest[inner_start..].find("}}") else {
            let remainder = &rest[inner_start..];
            let offset = template.len() - rest.len() + inner_start;
            debug!(
                "{}",
                format_template_error(
                    template,
                    Position::at(template, offset),
                    "missing closing '}}'",
                    Some(remainder),
                )
            );
            push_unique(&mut placeholders, remainder);
            output.push_str("**");
            output.push_str(remainder);
            break;
        };
        let inner = &rest[inner_start..inner_start + close];
        rest = &rest[inner_start + close + 2..];

        if seen > MAX_TEMPLATE_EXPRESSIONS {
            push_unique(&mut placeholders, inner);
            output.push_str("**");
            output.push_str(inner);
            output.push_str("**");
            continue;
        }

        let (query, tags) = if xml {
            matcher::carve_xml_tags(inner)
        } else {
            (inner.to_string(), Vec::new())
        };
        let query = query.trim();
        trace!(query, "evaluating placeholder");

        let outcome = {
            let evaluator = Evaluator::new(datasets, builtins);
            evaluator.evaluate_query(query)
        };
        match outcome {
            Ok(Some(node)) if !node.is_null() => {
                output.push_str(&value_utils::text_form(&node));
            }
            Ok(_) => {
                // no value present: rewrite and poison the query text
                push_unique(&mut placeholders, query);
                datasets.put_absent(query);
                output.push_str("**");
                output.push_str(query);
                output.push_str("**");
            }
            Err(crate::error::EngineError::UnresolvedDataset(name)) => {
                push_unique(&mut names, &name);
                // keep the placeholder verbatim for the next round
                output.push_str("{{");
                output.push_str(inner);
                output.push_str("}}");
            }
            Err(error) => {
                debug!(query, %error, "placeholder evaluation failed");
                push_unique(&mut placeholders, query);
                datasets.put_absent(query);
                output.push_str("**");
                output.push_str(query);
                output.push_str("**");
            }
        }
        for tag in tags {
            output.push_str(&tag);
        }
    }
    FillPass {
        output,
        names,
        placeholders,
        found_any,
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}
