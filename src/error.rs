//! Error types for the directive compiler.
//!
//! Only [`ConfigError`] is fatal. Every other error is absorbed during a
//! render: evaluation problems degrade to an empty string, failed template
//! loads leave the node untouched and failed links roll back their own edits.

use std::path::PathBuf;
use thiserror::Error;

/// Raised while registering directives or loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("directive name must not be empty")]
    EmptyName,

    #[error("directive `{0}` is an api view but declares no Controller")]
    MissingController(String),

    #[error("directive `{name}` has invalid restrict `{value}`, expected one of A, E, C")]
    InvalidRestrict { name: String, value: String },

    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why an interpolation expression produced no value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalWarning {
    #[error("invalid expression syntax: {0}")]
    Syntax(String),

    #[error("`{0}` is not defined in scope")]
    Unresolved(String),

    #[error("{receiver} has no method `{method}`")]
    UnknownMethod {
        method: String,
        receiver: &'static str,
    },

    #[error("`{0}` is not callable")]
    NotCallable(String),

    #[error("unsupported expression: {0}")]
    Unsupported(&'static str),

    #[error("expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("`{method}` argument out of range: {reason}")]
    OutOfRange {
        method: &'static str,
        reason: &'static str,
    },
}

/// Failure reported by a directive link function.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct LinkError {
    message: String,
}

impl LinkError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for LinkError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for LinkError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure to resolve a `templatePath`.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("template `{0}` not found")]
    NotFound(String),

    #[error("failed to read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
