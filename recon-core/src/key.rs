//! Cache keys addressing one cached query result.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered pair `(query, input)` identifying exactly one cached result.
///
/// Two keys are equal when the query names match and the inputs serialize
/// to the same canonical JSON text. `serde_json` keeps object keys sorted,
/// so field order in the input does not matter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheKey {
    query: String,
    input: Option<Value>,
}

impl CacheKey {
    /// Key for a query that takes no input.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            input: None,
        }
    }

    /// Key for a query with an already-encoded input.
    pub fn with_input(query: impl Into<String>, input: Value) -> Self {
        Self {
            query: query.into(),
            input: Some(input),
        }
    }

    /// Key for a query with a typed input.
    pub fn from_input<T: Serialize>(
        query: impl Into<String>,
        input: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::with_input(query, serde_json::to_value(input)?))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn input(&self) -> Option<&Value> {
        self.input.as_ref()
    }

    fn canonical_input(&self) -> Option<String> {
        self.input.as_ref().map(Value::to_string)
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.query == other.query && self.canonical_input() == other.canonical_input()
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.query.hash(state);
        self.canonical_input().hash(state);
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.input {
            Some(input) => write!(f, "{}({})", self.query, input),
            None => f.write_str(&self.query),
        }
    }
}
