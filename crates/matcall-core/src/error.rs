use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dtype::DType;

/// Failure reported by the engine itself (or by the channel to it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            identifier: None,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn identifier(&self) -> Option<&str> {
        self.identifier.as_deref()
    }

    /// Message with the engine's `Error: ` prefix removed, for display.
    pub fn display_message(&self) -> &str {
        crate::text::trim_error_prefix(&self.message)
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.identifier {
            Some(id) => write!(f, "{} ({id})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<String> for EngineError {
    fn from(value: String) -> Self {
        EngineError::new(value)
    }
}

impl From<&str> for EngineError {
    fn from(value: &str) -> Self {
        EngineError::new(value)
    }
}

/// Errors raised by the marshaling and proxy layer.
#[derive(Debug, Error)]
pub enum MatcallError {
    #[error("Cannot convert {type_name} to MATLAB object.")]
    UnsupportedType { type_name: String },
    #[error("Cannot convert array of dtype {dtype} to MATLAB array.")]
    UnsupportedDType { dtype: DType },
    #[error("Struct field names must be strings, got {key_type}.")]
    NonStringKey { key_type: String },
    #[error("Unrecognized function: {name}")]
    NameNotFound { name: String },
    #[error("Complicated property setting is not supported in {class_name} (property '{property}').")]
    UnsupportedPropertyAssignment { class_name: String, property: String },
    #[error("Cannot set value to method '{method}' of {class_name}.")]
    ImmutableMethod { class_name: String, method: String },
    #[error("'{class_name}' object has no attribute '{name}'.")]
    AttributeNotFound { class_name: String, name: String },
    #[error("Could not resolve attribute '{name}'.")]
    Unresolved { name: String },
    #[error("Invalid field name '{name}': {reason}")]
    InvalidFieldName { name: String, reason: String },
    #[error("No field named '{0}'.")]
    FieldNotFound(String),
    #[error("Data length {len} doesn't match shape {shape:?}")]
    ShapeMismatch { len: usize, shape: Vec<usize> },
    #[error("Expected {expected}, engine returned {found}")]
    UnexpectedValue { expected: String, found: String },
    #[error("Path '{}' does not exist.", .0.display())]
    PathNotFound(PathBuf),
    #[error("Cannot scan '{}': {reason}", path.display())]
    PathScan { path: PathBuf, reason: String },
    #[error("{0}")]
    Engine(#[from] EngineError),
}

impl MatcallError {
    pub(crate) fn unexpected(expected: impl Into<String>, found: impl fmt::Display) -> Self {
        MatcallError::UnexpectedValue {
            expected: expected.into(),
            found: found.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MatcallError>;
