//! Error types for the Entitle license engine
//!
//! Provides a unified error type and the domain-specific variants it wraps:
//! - ConfigurationError: a metric references something the catalog cannot resolve
//! - AccessorError: the equipment graph backend failed

use thiserror::Error;

/// Result type alias using EntitleError
pub type Result<T> = std::result::Result<T, EntitleError>;

/// Unified error type for license computations
#[derive(Debug, Error)]
pub enum EntitleError {
    // Metric configuration errors, always fatal for the call
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // A query succeeded but matched nothing
    #[error("No data: {0}")]
    NoData(String),

    // A caller-supplied identifier does not exist
    #[error("{kind} not found: {id}")]
    NodeNotFound { kind: String, id: String },

    // Backing store failures
    #[error("Accessor error: {0}")]
    Accessor(#[from] AccessorError),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EntitleError {
    /// Shorthand for a missing equipment instance
    pub fn equipment_not_found(id: impl Into<String>) -> Self {
        EntitleError::NodeNotFound {
            kind: "equipment".to_string(),
            id: id.into(),
        }
    }

    /// Whether this error only means "nothing matched"
    pub fn is_no_data(&self) -> bool {
        matches!(self, EntitleError::NoData(_))
    }
}

/// Unresolvable metric configuration
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Metric not found: {name}")]
    UnknownMetric { name: String },

    #[error("Unknown metric kind: {0}")]
    UnknownMetricKind(String),

    #[error("Metric {name} is of kind {actual}, expected {expected}")]
    KindMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Equipment type not found: {type_name}")]
    TypeNotFound { type_name: String },

    #[error("Equipment type {type_name} ({role}) is not part of the hierarchy starting at {start}")]
    TypeNotInChain {
        type_name: String,
        role: String,
        start: String,
    },

    #[error("Attribute {attribute} not found on equipment type {type_name}")]
    AttributeNotFound { type_name: String, attribute: String },

    #[error("Attribute {attribute} on equipment type {type_name} is not numeric")]
    AttributeNotNumeric { type_name: String, attribute: String },

    #[error("Invalid level order: base {base}, aggregate {aggregate}, top {top}")]
    InvalidLevelOrder {
        base: usize,
        aggregate: usize,
        top: usize,
    },

    #[error("Equipment type hierarchy is cyclic at {0}")]
    CyclicHierarchy(String),

    #[error("Invalid metric parameter: {0}")]
    InvalidParameter(String),
}

/// Equipment graph backend errors
#[derive(Debug, Error)]
pub enum AccessorError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    Query(String),
}

// Implement From for common external error types
impl From<serde_json::Error> for EntitleError {
    fn from(err: serde_json::Error) -> Self {
        EntitleError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for EntitleError {
    fn from(err: std::io::Error) -> Self {
        EntitleError::Accessor(AccessorError::Unavailable(err.to_string()))
    }
}

impl From<anyhow::Error> for EntitleError {
    fn from(err: anyhow::Error) -> Self {
        EntitleError::Internal(err.to_string())
    }
}
