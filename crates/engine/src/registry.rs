//! Dataset registry: the named JSON trees a merge draws from
//!
//! The registry is deliberately tri-state. A name can be *unknown* (never
//! seen, the resolver callbacks may still supply it), *unresolvable* (the
//! callbacks were exhausted, stored as `None` so the same name is never
//! chased again within the merge), or *known* with a node. Collapsing the
//! first two states makes the resolution driver loop forever.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{EngineError, EngineResult};

/// Outcome of a registry lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetLookup<'a> {
    /// The name has a dataset
    Known(&'a Value),
    /// The name is known to have no dataset; stays that way for the merge
    Unresolvable,
    /// The name has never been seen
    Unknown,
}

/// Mapping from dataset name to an optional node
#[derive(Debug, Clone, Default)]
pub struct DatasetRegistry {
    datasets: HashMap<String, Option<Value>>,
}

impl DatasetRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from the fields of an object node.
    ///
    /// Anything other than an object is rejected.
    pub fn from_value(node: Value) -> EngineResult<Self> {
        match node {
            Value::Object(fields) => {
                let datasets = fields.into_iter().map(|(k, v)| (k, Some(v))).collect();
                Ok(Self { datasets })
            }
            other => Err(EngineError::InvalidArgument(format!(
                "expected an object of datasets, got {}",
                crate::value_utils::kind_name(&other)
            ))),
        }
    }

    /// Build a registry of text datasets
    pub fn from_text_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let datasets = map
            .into_iter()
            .map(|(k, v)| (k.into(), Some(Value::String(v.into()))))
            .collect();
        Self { datasets }
    }

    /// Build a registry of integer datasets
    pub fn from_int_map<K>(map: impl IntoIterator<Item = (K, i64)>) -> Self
    where
        K: Into<String>,
    {
        let datasets = map
            .into_iter()
            .map(|(k, v)| (k.into(), Some(Value::Number(v.into()))))
            .collect();
        Self { datasets }
    }

    /// Insert or replace a dataset
    pub fn put(&mut self, name: impl Into<String>, node: Value) {
        self.datasets.insert(name.into(), Some(node));
    }

    /// Mark a name as known-unresolvable for the rest of the merge
    pub fn put_absent(&mut self, name: impl Into<String>) {
        self.datasets.insert(name.into(), None);
    }

    /// Store a resolver answer: `Some` is a dataset, `None` poisons the name
    pub fn put_option(&mut self, name: impl Into<String>, node: Option<Value>) {
        self.datasets.insert(name.into(), node);
    }

    /// Tri-state lookup
    pub fn lookup(&self, name: &str) -> DatasetLookup<'_> {
        match self.datasets.get(name) {
            Some(Some(node)) => DatasetLookup::Known(node),
            Some(None) => DatasetLookup::Unresolvable,
            None => DatasetLookup::Unknown,
        }
    }

    /// The dataset stored under `name`, if any
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.datasets.get(name) {
            Some(Some(node)) => Some(node),
            _ => None,
        }
    }

    /// Whether the name is present at all (dataset or poisoned)
    pub fn contains(&self, name: &str) -> bool {
        self.datasets.contains_key(name)
    }

    /// Number of entries, poisoned names included
    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    /// True when no dataset was ever stored
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tri_state_lookup() {
        let mut registry = DatasetRegistry::new();
        registry.put("order", json!({"id": 1}));
        registry.put_absent("stock");

        assert!(matches!(registry.lookup("order"), DatasetLookup::Known(_)));
        assert_eq!(registry.lookup("stock"), DatasetLookup::Unresolvable);
        assert_eq!(registry.lookup("customer"), DatasetLookup::Unknown);
    }

    #[test]
    fn test_from_value_requires_object() {
        let ok = DatasetRegistry::from_value(json!({"a": 1, "b": [2]}));
        assert_eq!(ok.unwrap().len(), 2);

        let err = DatasetRegistry::from_value(json!([1, 2]));
        assert!(matches!(err, Err(EngineError::InvalidArgument(_))));
    }

    #[test]
    fn test_text_and_int_maps() {
        let registry = DatasetRegistry::from_text_map([("greeting", "Hi")]);
        assert_eq!(registry.get("greeting"), Some(&json!("Hi")));

        let registry = DatasetRegistry::from_int_map([("n", 3)]);
        assert_eq!(registry.get("n"), Some(&json!(3)));
    }

    #[test]
    fn test_put_option_poisons() {
        let mut registry = DatasetRegistry::new();
        registry.put_option("gone", None);
        assert!(registry.contains("gone"));
        assert_eq!(registry.get("gone"), None);
    }
}
