//! Error types for query evaluation and template merging

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

/// Result alias used throughout the crate
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the engine
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// A query referenced a dataset that is neither in the registry nor
    /// explicitly marked unresolvable. Recoverable inside the resolver loop.
    #[error("unresolved dataset '{0}'")]
    UnresolvedDataset(String),

    /// Terminal failure of a merge: the best-effort text plus the full
    /// failure inventory.
    #[error("{0}")]
    NoValuePresent(NoValuePresent),

    /// Malformed input: bad join arity, non-object constructor input, etc.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A statement or path that cannot be decomposed into tokens.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// A function name with no entry in the builtin registry.
    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    /// A builtin rejected its arguments.
    #[error("invalid argument for function '{function}': {reason}")]
    FunctionArgument {
        /// Name of the builtin that rejected the call
        function: String,
        /// What was wrong with the arguments
        reason: String,
    },
}

impl EngineError {
    pub(crate) fn function_argument(function: &str, reason: impl Into<String>) -> Self {
        Self::FunctionArgument {
            function: function.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure inventory of a merge that could not complete.
///
/// `partial_text` is the template after every placeholder was either resolved
/// or rewritten as `**query**`; no `{{...}}` region survives in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoValuePresent {
    /// Dataset names that stayed unknown after the resolver callbacks ran
    pub unresolved_datasets: BTreeSet<String>,
    /// Queries that evaluated to nothing and were rewritten as `**query**`
    pub unresolvable_placeholders: BTreeSet<String>,
    /// The best-effort merged text
    pub partial_text: String,
}

impl NoValuePresent {
    pub(crate) fn new(
        unresolved_datasets: impl IntoIterator<Item = String>,
        unresolvable_placeholders: impl IntoIterator<Item = String>,
        partial_text: String,
    ) -> Self {
        Self {
            unresolved_datasets: unresolved_datasets.into_iter().collect(),
            unresolvable_placeholders: unresolvable_placeholders.into_iter().collect(),
            partial_text,
        }
    }
}

impl fmt::Display for NoValuePresent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no value present")?;
        if !self.unresolved_datasets.is_empty() {
            write!(f, "; unresolved datasets {:?}", self.unresolved_datasets)?;
        }
        if !self.unresolvable_placeholders.is_empty() {
            write!(
                f,
                "; unresolvable placeholders {:?}",
                self.unresolvable_placeholders
            )?;
        }
        Ok(())
    }
}
