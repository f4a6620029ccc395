//! Error types for relation resolution.
//!
//! `RelationError` is the single error surfaced by `get`, `join`, `save` and
//! `delete`. Configuration problems abort the call and name the relation they
//! belong to; storage failures pass through untouched.

use crate::executor::ExecutorError;

/// Error type for relation operations
#[derive(Debug)]
pub enum RelationError {
    /// The relation is misconfigured or was handed values it cannot work with
    Configuration {
        relation: String,
        message: String,
    },
    /// Statement execution failed; carries the executor's error unchanged
    Storage(ExecutorError),
    /// A model failed to save, delete or hydrate itself
    Model {
        model: String,
        message: String,
    },
}

impl RelationError {
    /// Build a configuration error for `relation`
    pub fn configuration(relation: impl Into<String>, message: impl Into<String>) -> Self {
        RelationError::Configuration {
            relation: relation.into(),
            message: message.into(),
        }
    }

    /// Build a model error for `model`
    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        RelationError::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, RelationError::Configuration { .. })
    }
}

impl std::fmt::Display for RelationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelationError::Configuration { relation, message } => {
                write!(f, "Relation \"{}\" is misconfigured: {}", relation, message)
            }
            RelationError::Storage(err) => write!(f, "Storage error: {}", err),
            RelationError::Model { model, message } => {
                write!(f, "Model {} failed: {}", model, message)
            }
        }
    }
}

impl std::error::Error for RelationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RelationError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ExecutorError> for RelationError {
    fn from(err: ExecutorError) -> Self {
        RelationError::Storage(err)
    }
}

/// Result alias used across the crate
pub type Result<T, E = RelationError> = std::result::Result<T, E>;
