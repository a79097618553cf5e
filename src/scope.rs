//! Render scope: the data context interpolation expressions are evaluated in.
//!
//! A scope is a `serde_json` object plus a table of callable members keyed by
//! their dotted path (`format`, `helpers.upper`). The compiler only reads it.

use serde_json::{Map, Value as Json};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// A callable scope member.
pub type ScopeFn = Arc<dyn Fn(&[Value]) -> Value + Send + Sync>;

#[derive(Clone, Default)]
pub struct Scope {
    data: Map<String, Json>,
    functions: HashMap<String, ScopeFn>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scope from a JSON object. Any other JSON value yields an
    /// empty scope.
    pub fn from_json(value: Json) -> Self {
        match value {
            Json::Object(data) => Self {
                data,
                functions: HashMap::new(),
            },
            _ => Self::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Json>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Json>) {
        self.data.insert(key.into(), value.into());
    }

    /// Registers a callable member under a dotted path.
    pub fn with_function<F>(mut self, path: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Value + Send + Sync + 'static,
    {
        self.functions.insert(path.into(), Arc::new(function));
        self
    }

    pub fn data(&self) -> &Map<String, Json> {
        &self.data
    }

    /// Top-level lookup of a single identifier. Deeper paths are walked by
    /// the evaluator through [`Value::get`].
    pub fn get(&self, name: &str) -> Option<&Json> {
        self.data.get(name)
    }

    pub fn function(&self, path: &str) -> Option<&ScopeFn> {
        self.functions.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.functions.is_empty()
    }
}

impl From<Json> for Scope {
    fn from(value: Json) -> Self {
        Self::from_json(value)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut functions: Vec<_> = self.functions.keys().collect();
        functions.sort();
        f.debug_struct("Scope")
            .field("data", &self.data)
            .field("functions", &functions)
            .finish()
    }
}
