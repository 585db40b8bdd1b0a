//! The engine façade: dataset registry, builtin registry, and the public
//! merge and query operations.

use std::fmt;

use serde_json::Value;

use crate::builtins::{BuiltinFunction, BuiltinRegistry};
use crate::error::{EngineError, EngineResult};
use crate::eval::Evaluator;
use crate::progress::ResolverProgress;
use crate::registry::DatasetRegistry;
use crate::resolver::{DataFinder, DictionaryFinder, Resolver};

#[cfg(feature = "cache")]
use std::sync::Arc;

#[cfg(feature = "cache")]
use crate::matcher::{self, TernaryStep};

/// Parsed queries kept by the engine before eviction kicks in
#[cfg(feature = "cache")]
const QUERY_CACHE_SIZE: u64 = 1000;

/// A JSON query and template-merge engine.
///
/// The engine owns a registry of named datasets. Templates contain
/// `{{query}}` placeholders; a merge evaluates every query against the
/// registry and returns the merged text. The resolver variants load
/// missing datasets on demand through caller-supplied callbacks.
///
/// ```
/// use weld_engine::Engine;
///
/// let mut engine = Engine::new();
/// engine.put_dataset("user", serde_json::json!({"name": "Ada"}));
/// let merged = engine.fill_in_placeholder("Hello {{user.name}}!").unwrap();
/// assert_eq!(merged, "Hello Ada!");
/// ```
pub struct Engine {
    datasets: DatasetRegistry,
    builtins: BuiltinRegistry,
    /// Parsed ternary chains keyed by query text
    #[cfg(feature = "cache")]
    query_cache: moka::sync::Cache<String, Arc<Vec<TernaryStep>>>,
}

impl Engine {
    /// Create an engine with an empty dataset registry
    pub fn new() -> Self {
        Self::with_registry(DatasetRegistry::new())
    }

    /// Create an engine whose datasets are the fields of an object node.
    ///
    /// Anything other than an object is an `InvalidArgument` error.
    pub fn from_value(node: Value) -> EngineResult<Self> {
        Ok(Self::with_registry(DatasetRegistry::from_value(node)?))
    }

    /// Create an engine from a `name -> text` map
    pub fn from_text_map<K, V>(map: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_registry(DatasetRegistry::from_text_map(map))
    }

    /// Create an engine from a `name -> integer` map
    pub fn from_int_map<K>(map: impl IntoIterator<Item = (K, i64)>) -> Self
    where
        K: Into<String>,
    {
        Self::with_registry(DatasetRegistry::from_int_map(map))
    }

    fn with_registry(datasets: DatasetRegistry) -> Self {
        Self {
            datasets,
            builtins: BuiltinRegistry::new(),
            #[cfg(feature = "cache")]
            query_cache: moka::sync::Cache::new(QUERY_CACHE_SIZE),
        }
    }

    /// Insert or replace a dataset
    pub fn put_dataset(&mut self, name: impl Into<String>, node: Value) {
        self.datasets.put(name, node);
    }

    /// The dataset stored under `name`, if any
    pub fn dataset(&self, name: &str) -> Option<&Value> {
        self.datasets.get(name)
    }

    /// The dataset registry
    pub fn registry(&self) -> &DatasetRegistry {
        &self.datasets
    }

    /// Register an additional builtin function
    pub fn register_function(&mut self, name: impl Into<String>, func: BuiltinFunction) {
        self.builtins.register(name, func);
    }

    /// Merge a template against the registry alone.
    ///
    /// Unknown dataset names become unresolvable: their placeholders are
    /// rewritten as `**query**` and reported through
    /// [`EngineError::NoValuePresent`] together with the best-effort text.
    pub fn fill_in_placeholder(&mut self, template: &str) -> EngineResult<String> {
        self.fill_without_resolver(template, false)
    }

    /// XML-aware variant of [`Engine::fill_in_placeholder`]: placeholder
    /// text may be interrupted by `<...>` tags, which are preserved as
    /// output, and the query is XML-unescaped before parsing.
    pub fn fill_in_xml_placeholder(&mut self, template: &str) -> EngineResult<String> {
        self.fill_without_resolver(template, true)
    }

    fn fill_without_resolver(&mut self, template: &str, xml: bool) -> EngineResult<String> {
        let mut progress = ResolverProgress::new();
        let resolver = Resolver::new(
            &mut self.datasets,
            &self.builtins,
            |_name: &str| None,
            |_collection: &str, _payload: &str| None,
        );
        resolver.fill(template, xml, &mut progress)
    }

    /// Merge a template, loading missing datasets through the callbacks
    pub fn fill_in_placeholder_with_resolver<F, D>(
        &mut self,
        template: &str,
        dictionary_finder: F,
        data_finder: D,
        progress: &mut ResolverProgress,
    ) -> EngineResult<String>
    where
        F: DictionaryFinder,
        D: DataFinder,
    {
        Resolver::new(&mut self.datasets, &self.builtins, dictionary_finder, data_finder)
            .fill(template, false, progress)
    }

    /// XML-aware variant of [`Engine::fill_in_placeholder_with_resolver`]
    pub fn fill_in_xml_placeholder_with_resolver<F, D>(
        &mut self,
        template: &str,
        dictionary_finder: F,
        data_finder: D,
        progress: &mut ResolverProgress,
    ) -> EngineResult<String>
    where
        F: DictionaryFinder,
        D: DataFinder,
    {
        Resolver::new(&mut self.datasets, &self.builtins, dictionary_finder, data_finder)
            .fill(template, true, progress)
    }

    /// Evaluate a query against the registry.
    ///
    /// `Ok(None)` means the query resolved to nothing; a dataset name that
    /// is neither stored nor poisoned is [`EngineError::UnresolvedDataset`].
    pub fn evaluate_query(&self, query: &str) -> EngineResult<Option<Value>> {
        let evaluator = Evaluator::new(&self.datasets, &self.builtins);
        #[cfg(feature = "cache")]
        {
            if matcher::match_join(query).is_none() {
                let steps = match self.query_cache.get(query) {
                    Some(steps) => steps,
                    None => {
                        let steps = Arc::new(matcher::decompose_ternary_steps(query));
                        self.query_cache.insert(query.to_string(), Arc::clone(&steps));
                        steps
                    }
                };
                return evaluator.evaluate_steps(&steps);
            }
        }
        evaluator.evaluate_query(query)
    }

    /// Evaluate a query, loading missing datasets through the callbacks
    pub fn evaluate_query_with_resolver<F, D>(
        &mut self,
        query: &str,
        dictionary_finder: F,
        data_finder: D,
        progress: &mut ResolverProgress,
    ) -> EngineResult<Option<Value>>
    where
        F: DictionaryFinder,
        D: DataFinder,
    {
        Resolver::new(&mut self.datasets, &self.builtins, dictionary_finder, data_finder)
            .evaluate(query, progress)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("datasets", &self.datasets.len())
            .finish_non_exhaustive()
    }
}

/// Convenience conversion for callers that already hold an object node
impl TryFrom<Value> for Engine {
    type Error = EngineError;

    fn try_from(node: Value) -> Result<Self, Self::Error> {
        Self::from_value(node)
    }
}
