//! Callback-driven dataset resolution
//!
//! The driver interleaves placeholder passes with on-demand dataset
//! loading. Each failing pass reports the dataset names it could not
//! resolve; the driver asks the dictionary finder for a query per name,
//! classifies it (DB query, join, or named query), executes it, and runs
//! the next pass. A repeating-suffix check over the name history is the
//! safeguard against self-referential dictionaries: a name whose last *k*
//! lookups repeat the *k* before them is declared unresolvable.

use serde_json::Value;
use tracing::debug;

use crate::builtins::BuiltinRegistry;
use crate::error::{EngineError, EngineResult, NoValuePresent};
use crate::eval::Evaluator;
use crate::matcher;
use crate::progress::ResolverProgress;
use crate::registry::DatasetRegistry;
use crate::template::fill_in_placeholder_loop;

/// Maps an unknown dataset name to a query string; `None` means the
/// dictionary has no definition for it.
pub trait DictionaryFinder: FnMut(&str) -> Option<String> {}
impl<T: FnMut(&str) -> Option<String>> DictionaryFinder for T {}

/// Resolves a DB-query match to a dataset; called with the collection name
/// suffixed by the one-or-many symbol, and the opaque payload.
pub trait DataFinder: FnMut(&str, &str) -> Option<Value> {}
impl<T: FnMut(&str, &str) -> Option<Value>> DataFinder for T {}

pub(crate) struct Resolver<'e, F, D> {
    datasets: &'e mut DatasetRegistry,
    builtins: &'e BuiltinRegistry,
    dictionary_finder: F,
    data_finder: D,
    /// Linear history of every dictionary lookup, for the cycle check
    history: Vec<String>,
    /// Names queued for the next round
    pending: Vec<String>,
    /// Accumulated unresolvable placeholders across rounds
    unresolvable: Vec<String>,
}

impl<'e, F, D> Resolver<'e, F, D>
where
    F: DictionaryFinder,
    D: DataFinder,
{
    pub(crate) fn new(
        datasets: &'e mut DatasetRegistry,
        builtins: &'e BuiltinRegistry,
        dictionary_finder: F,
        data_finder: D,
    ) -> Self {
        Self {
            datasets,
            builtins,
            dictionary_finder,
            data_finder,
            history: Vec::new(),
            pending: Vec::new(),
            unresolvable: Vec::new(),
        }
    }

    /// Merge a template, loading datasets on demand
    pub(crate) fn fill(
        mut self,
        template: &str,
        xml: bool,
        progress: &mut ResolverProgress,
    ) -> EngineResult<String> {
        let mut text = template.to_string();
        let merged = loop {
            progress.next_round();
            if !self.pending.is_empty() {
                let names = std::mem::take(&mut self.pending);
                self.resolve_names(&names, progress);
                continue;
            }
            match fill_in_placeholder_loop(self.datasets, self.builtins, &text, xml) {
                Ok(merged) => break merged,
                Err(failure) => {
                    for placeholder in failure.placeholders {
                        push_unique(&mut self.unresolvable, &placeholder);
                    }
                    text = failure.partial;
                    if !failure.names.is_empty() {
                        self.resolve_names(&failure.names, progress);
                    }
                }
            }
        };
        progress.mark_end_if_auto();
        if self.unresolvable.is_empty() {
            Ok(merged)
        } else {
            Err(EngineError::NoValuePresent(NoValuePresent::new(
                std::mem::take(&mut self.pending),
                std::mem::take(&mut self.unresolvable),
                merged,
            )))
        }
    }

    /// Evaluate a query, loading datasets on demand, and return the node
    pub(crate) fn evaluate(
        mut self,
        query: &str,
        progress: &mut ResolverProgress,
    ) -> EngineResult<Option<Value>> {
        let result = self.evaluate_resolving(query, progress);
        progress.mark_end_if_auto();
        result
    }

    /// Retry-evaluate a query until every dataset it needs is settled
    fn evaluate_resolving(
        &mut self,
        query: &str,
        progress: &mut ResolverProgress,
    ) -> EngineResult<Option<Value>> {
        loop {
            while !self.pending.is_empty() {
                progress.next_round();
                let names = std::mem::take(&mut self.pending);
                self.resolve_names(&names, progress);
            }
            let outcome = {
                let evaluator = Evaluator::new(self.datasets, self.builtins);
                evaluator.evaluate_query(query)
            };
            match outcome {
                Err(EngineError::UnresolvedDataset(name)) => {
                    progress.next_round();
                    self.resolve_names(&[name], progress);
                }
                other => break other,
            }
        }
    }

    /// One resolution round over the reported names, in report order
    fn resolve_names(&mut self, names: &[String], progress: &mut ResolverProgress) {
        let mut named_queries: Vec<(String, String)> = Vec::new();
        for name in names {
            if self.datasets.contains(name) {
                continue;
            }
            if self.check_cycle(name) {
                debug!(name = %name, "dictionary reference cycle");
                progress.add_step(format!("Dictionary cycle detected at {name}"));
                self.mark_unresolvable(name);
                continue;
            }
            let Some(query) = (self.dictionary_finder)(name) else {
                self.mark_unresolvable(name);
                continue;
            };
            // The dictionary entry may itself contain placeholders.
            let query = match fill_in_placeholder_loop(
                self.datasets,
                self.builtins,
                &query,
                false,
            ) {
                Ok(query) => query,
                Err(failure) => {
                    if failure.placeholders.is_empty() {
                        // inner names first; this name is re-reported later
                        for inner in failure.names {
                            push_unique(&mut self.pending, &inner);
                        }
                    } else {
                        for placeholder in failure.placeholders {
                            push_unique(&mut self.unresolvable, &placeholder);
                        }
                        self.mark_unresolvable(name);
                    }
                    continue;
                }
            };
            if let Some(db_query) = matcher::match_db_query(&query) {
                progress.add_resolving_from(name, &query);
                let collection = if db_query.collection.is_empty() {
                    name.as_str()
                } else {
                    db_query.collection
                };
                let target = format!("{collection}{}", db_query.symbol);
                let dataset = (self.data_finder)(&target, db_query.payload);
                progress.add_resolved(name, dataset.as_ref());
                self.datasets.put_option(name.clone(), dataset);
            } else if matcher::match_join(&query).is_some() {
                progress.add_resolving_from(name, &query);
                match self.evaluate_resolving(&query, progress) {
                    Ok(Some(node)) => {
                        progress.add_resolved(name, Some(&node));
                        self.datasets.put(name.clone(), node);
                    }
                    Ok(None) => {
                        progress.add_resolved(name, None);
                        self.mark_unresolvable(name);
                    }
                    Err(error) => {
                        debug!(name = %name, %error, "join resolution failed");
                        progress.add_step(format!("Join failed for {name} : {error}"));
                        self.datasets.put_absent(name.clone());
                    }
                }
            } else {
                named_queries.push((name.clone(), query));
            }
        }
        if named_queries.is_empty() {
            return;
        }
        let batch: Vec<&String> = named_queries.iter().map(|(name, _)| name).collect();
        progress.add_step(format!("Resolving named queries {batch:?}"));
        for (name, query) in &named_queries {
            let outcome = {
                let evaluator = Evaluator::new(self.datasets, self.builtins);
                evaluator.evaluate_query(query)
            };
            match outcome {
                Ok(Some(node)) => {
                    progress.add_resolved(name, Some(&node));
                    self.datasets.put(name.clone(), node);
                }
                Ok(None) => {
                    progress.add_resolved(name, None);
                    self.mark_unresolvable(name);
                }
                Err(EngineError::UnresolvedDataset(inner)) => {
                    push_unique(&mut self.pending, &inner);
                }
                Err(error) => {
                    debug!(name = %name, %error, "named query failed");
                    progress.add_step(format!("Query failed for {name} : {error}"));
                    self.mark_unresolvable(name);
                }
            }
        }
    }

    /// Push a name onto the lookup history and test for a repeating suffix:
    /// the last `k` entries equalling the `k` before them, for any
    /// `1 <= k <= len/2`.
    fn check_cycle(&mut self, name: &str) -> bool {
        self.history.push(name.to_string());
        let len = self.history.len();
        (1..=len / 2)
            .any(|k| self.history[len - k..] == self.history[len - 2 * k..len - k])
    }

    /// Poison a name for the rest of the merge. The unresolvable-placeholder
    /// inventory is fed by the rewrite passes, not here: the poisoned name
    /// surfaces as `**query**` on the next pass that touches it.
    fn mark_unresolvable(&mut self, name: &str) {
        self.datasets.put_absent(name.to_string());
    }
}

fn push_unique(list: &mut Vec<String>, item: &str) {
    if !list.iter().any(|existing| existing == item) {
        list.push(item.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn no_dictionary(_: &str) -> Option<String> {
        None
    }

    fn no_data(_: &str, _: &str) -> Option<Value> {
        None
    }

    #[test]
    fn test_unknown_name_becomes_unresolvable() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let resolver = Resolver::new(&mut datasets, &builtins, no_dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let error = resolver
            .fill("[{{x}}][{{x}}]", false, &mut progress)
            .unwrap_err();
        let EngineError::NoValuePresent(failure) = error else {
            panic!("expected NoValuePresent");
        };
        assert_eq!(failure.partial_text, "[**x**][**x**]");
        assert!(failure.unresolvable_placeholders.contains("x"));
        assert!(failure.unresolved_datasets.is_empty());
    }

    #[test]
    fn test_dictionary_chain_resolves() {
        let mut datasets = DatasetRegistry::new();
        datasets.put("price", json!(12));
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| match name {
            "label" => Some("concat('price is ', 'high')".to_string()),
            "verdict" => Some("price > 10 ? label : 'cheap'".to_string()),
            _ => None,
        };
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let merged = resolver.fill("{{verdict}}", false, &mut progress).unwrap();
        assert_eq!(merged, "price is high");
    }

    #[test]
    fn test_dictionary_query_with_placeholder() {
        let mut datasets = DatasetRegistry::new();
        datasets.put("threshold", json!(10));
        datasets.put("n", json!(42));
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| {
            (name == "answer").then(|| "n > {{threshold}} ? 'yes' : 'no'".to_string())
        };
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let merged = resolver.fill("{{answer}}", false, &mut progress).unwrap();
        assert_eq!(merged, "yes");
    }

    #[test]
    fn test_db_query_dispatch() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let dictionary =
            |name: &str| (name == "order").then(|| "orders ? {\"id\": 7}".to_string());
        let data = |target: &str, payload: &str| {
            assert_eq!(target, "orders?");
            assert_eq!(payload, "{\"id\": 7}");
            Some(json!({"id": 7, "total": 95}))
        };
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, data);
        let mut progress = ResolverProgress::new();
        let merged = resolver
            .fill("total: {{order.total}}", false, &mut progress)
            .unwrap();
        assert_eq!(merged, "total: 95");
        assert!(progress.steps().iter().any(|s| s.contains("Resolving order")));
    }

    #[test]
    fn test_db_query_reuses_dataset_name_as_collection() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| (name == "stock").then(|| "[] {\"all\": 1}".to_string());
        let data = |target: &str, _payload: &str| {
            assert_eq!(target, "stock[]");
            Some(json!([{"sku": "a"}]))
        };
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, data);
        let mut progress = ResolverProgress::new();
        let merged = resolver
            .fill("{{stock[0].sku}}", false, &mut progress)
            .unwrap();
        assert_eq!(merged, "a");
    }

    #[test]
    fn test_join_dictionary_entry() {
        let mut datasets = DatasetRegistry::new();
        datasets.put("L", json!([{"id": 1}, {"id": 2}]));
        datasets.put("R", json!([{"id": 2, "b": "B"}]));
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| (name == "joined").then(|| "L{id} >=< R{id}".to_string());
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let merged = resolver.fill("{{joined}}", false, &mut progress).unwrap();
        assert_eq!(merged, r#"[{"id":2,"b":"B"}]"#);
    }

    #[test]
    fn test_cycle_terminates() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| match name {
            "a" => Some("{{b}}".to_string()),
            "b" => Some("{{a}}".to_string()),
            _ => None,
        };
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new().with_auto_mark_end(true);
        let error = resolver.fill("{{a}}", false, &mut progress).unwrap_err();
        let EngineError::NoValuePresent(failure) = error else {
            panic!("expected NoValuePresent");
        };
        assert!(failure.unresolvable_placeholders.contains("a"));
        assert_eq!(progress.steps().last().map(String::as_str), Some("End"));
    }

    #[test]
    fn test_self_reference_terminates() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| (name == "a").then(|| "a.field".to_string());
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let error = resolver.fill("{{a}}", false, &mut progress).unwrap_err();
        assert!(matches!(error, EngineError::NoValuePresent(_)));
    }

    #[test]
    fn test_evaluate_with_resolver() {
        let mut datasets = DatasetRegistry::new();
        datasets.put("base", json!(40));
        let builtins = BuiltinRegistry::new();
        let dictionary = |name: &str| (name == "extra").then(|| "2".to_string());
        let resolver = Resolver::new(&mut datasets, &builtins, dictionary, no_data);
        let mut progress = ResolverProgress::new();
        let node = resolver
            .evaluate("base + extra", &mut progress)
            .unwrap();
        assert_eq!(node, Some(json!(42)));
    }

    #[test]
    fn test_repeating_suffix_detector() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let mut resolver =
            Resolver::new(&mut datasets, &builtins, no_dictionary, no_data);
        assert!(!resolver.check_cycle("a"));
        assert!(!resolver.check_cycle("b"));
        assert!(!resolver.check_cycle("a"));
        // history [a, b, a, b]: the last two repeat the two before
        assert!(resolver.check_cycle("b"));
    }

    #[test]
    fn test_immediate_repeat_is_a_cycle() {
        let mut datasets = DatasetRegistry::new();
        let builtins = BuiltinRegistry::new();
        let mut resolver =
            Resolver::new(&mut datasets, &builtins, no_dictionary, no_data);
        assert!(!resolver.check_cycle("a"));
        assert!(resolver.check_cycle("a"));
    }
}
