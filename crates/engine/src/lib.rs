//! # weld-engine
//!
//! A JSON-oriented query and template-merge engine. Given a collection of
//! named JSON datasets and a text template containing `{{...}}`
//! placeholders written in a small query language, the engine resolves
//! every placeholder against the datasets and returns the merged text.
//!
//! The query language covers dotted path navigation with array filters,
//! ternary chains, logical/relational expressions, a builtin function
//! catalog, and five join operators between datasets. Missing datasets can
//! be fetched on demand through caller-supplied callbacks; resolved
//! datasets are cached for reuse within a merge, and a cycle detector
//! keeps self-referential dictionaries from looping forever.
//!
//! ## Merging a template
//!
//! ```
//! use serde_json::json;
//! use weld_engine::Engine;
//!
//! let mut engine = Engine::new();
//! engine.put_dataset("order", json!({"id": 7, "items": [
//!     {"name": "pen", "price": 4},
//!     {"name": "ink", "price": 12},
//! ]}));
//!
//! let merged = engine
//!     .fill_in_placeholder("Order #{{order.id}}: {{order.items[price > 10].name}}")
//!     .unwrap();
//! assert_eq!(merged, "Order #7: ink");
//! ```
//!
//! ## Resolving datasets on demand
//!
//! ```
//! use serde_json::json;
//! use weld_engine::{Engine, ResolverProgress};
//!
//! let mut engine = Engine::new();
//! let mut progress = ResolverProgress::new();
//! let merged = engine
//!     .fill_in_placeholder_with_resolver(
//!         "Hello {{user.name}}!",
//!         |name| (name == "user").then(|| "people ? {\"id\": 1}".to_string()),
//!         |_collection, _payload| Some(json!({"name": "Ada"})),
//!         &mut progress,
//!     )
//!     .unwrap();
//! assert_eq!(merged, "Hello Ada!");
//! ```

pub mod builtins;
mod engine;
mod error;
mod error_formatter;
mod eval;
mod join;
mod matcher;
mod path;
mod progress;
mod registry;
mod resolver;
mod template;
pub mod value_utils;

pub use engine::Engine;
pub use error::{EngineError, EngineResult, NoValuePresent};
pub use progress::{ResolverDebugLevel, ResolverProgress};
pub use registry::{DatasetLookup, DatasetRegistry};
pub use resolver::{DataFinder, DictionaryFinder};
pub use template::Position;

pub use builtins::{BuiltinFunction, BuiltinRegistry};
