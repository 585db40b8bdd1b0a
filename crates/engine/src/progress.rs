//! Resolution progress log
//!
//! An append-only list of step strings plus a round counter, kept by the
//! caller across a resolver-driven merge. Purely diagnostic; the engine
//! never reads it back.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How resolved nodes are stringified into progress steps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResolverDebugLevel {
    /// Only value nodes are printed; containers are summarised
    #[default]
    ShowValueNodeOnly,
    /// Objects are printed in full, arrays summarised
    ShowUpToObjectNode,
    /// Everything is printed in full
    ShowUpToArrayNode,
}

/// Append-only progress log for a resolver-driven merge
#[derive(Debug, Clone, Default)]
pub struct ResolverProgress {
    steps: Vec<String>,
    round: usize,
    debug_level: ResolverDebugLevel,
    auto_mark_end: bool,
}

impl ResolverProgress {
    /// Create a progress log with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Select how resolved datasets appear in the log
    pub fn with_debug_level(mut self, level: ResolverDebugLevel) -> Self {
        self.debug_level = level;
        self
    }

    /// Append a terminal entry automatically when the outer call returns
    pub fn with_auto_mark_end(mut self, auto: bool) -> Self {
        self.auto_mark_end = auto;
        self
    }

    /// The recorded steps, oldest first
    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    /// The current resolution round, starting at 1 after the first pass
    pub fn round(&self) -> usize {
        self.round
    }

    /// Begin the next resolution round
    pub(crate) fn next_round(&mut self) {
        self.round += 1;
    }

    /// Append one free-form step
    pub(crate) fn add_step(&mut self, message: impl Into<String>) {
        self.steps.push(format!("Round {} : {}", self.round, message.into()));
    }

    pub(crate) fn add_resolving_from(&mut self, name: &str, query: &str) {
        self.add_step(format!("Resolving {name} from query {query}"));
    }

    pub(crate) fn add_resolved(&mut self, name: &str, node: Option<&Value>) {
        match node {
            Some(node) => {
                let rendered = self.render(node);
                self.add_step(format!("Resolved {name} = {rendered}"));
            }
            None => self.add_step(format!("Unresolvable {name}")),
        }
    }

    /// Append the terminal entry
    pub fn mark_end(&mut self) {
        if self.steps.last().map(String::as_str) != Some("End") {
            self.steps.push("End".to_string());
        }
    }

    pub(crate) fn mark_end_if_auto(&mut self) {
        if self.auto_mark_end {
            self.mark_end();
        }
    }

    fn render(&self, node: &Value) -> String {
        match node {
            Value::Array(elements) => match self.debug_level {
                ResolverDebugLevel::ShowUpToArrayNode => node.to_string(),
                _ => format!("Array with {} elements", elements.len()),
            },
            Value::Object(fields) => match self.debug_level {
                ResolverDebugLevel::ShowValueNodeOnly => {
                    format!("Object with {} fields", fields.len())
                }
                _ => node.to_string(),
            },
            _ => node.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_round_prefix() {
        let mut progress = ResolverProgress::new();
        progress.next_round();
        progress.add_step("first");
        progress.next_round();
        progress.add_step("second");
        assert_eq!(
            progress.steps(),
            ["Round 1 : first".to_string(), "Round 2 : second".to_string()]
        );
        assert_eq!(progress.round(), 2);
    }

    #[test]
    fn test_debug_levels() {
        let value = json!([1, 2, 3]);
        let mut progress = ResolverProgress::new();
        progress.next_round();
        progress.add_resolved("xs", Some(&value));
        assert!(progress.steps()[0].contains("Array with 3 elements"));

        let mut progress =
            ResolverProgress::new().with_debug_level(ResolverDebugLevel::ShowUpToArrayNode);
        progress.next_round();
        progress.add_resolved("xs", Some(&value));
        assert!(progress.steps()[0].contains("[1,2,3]"));

        let object = json!({"a": 1});
        let mut progress =
            ResolverProgress::new().with_debug_level(ResolverDebugLevel::ShowUpToObjectNode);
        progress.next_round();
        progress.add_resolved("o", Some(&object));
        assert!(progress.steps()[0].contains("{\"a\":1}"));
    }

    #[test]
    fn test_mark_end_once() {
        let mut progress = ResolverProgress::new().with_auto_mark_end(true);
        progress.mark_end_if_auto();
        progress.mark_end_if_auto();
        assert_eq!(progress.steps(), ["End".to_string()]);
    }

    #[test]
    fn test_unresolvable_entry() {
        let mut progress = ResolverProgress::new();
        progress.next_round();
        progress.add_resolved("gone", None);
        assert_eq!(progress.steps(), ["Round 1 : Unresolvable gone".to_string()]);
    }
}
