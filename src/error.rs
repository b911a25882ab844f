//! Error types for the reconciler
//!
//! Only structural failures live here. Cross-source inconsistencies are
//! reported through [`crate::diagnostics::Diagnostics`] and never abort a run.

use thiserror::Error;

/// Result type for reconciler operations
pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Fatal reconciler errors
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Required structure missing from {source_name}: {what}")]
    MissingStructure { source_name: String, what: String },

    #[error("Class id '{id}' referenced by '{referenced_by}' does not exist in the class model")]
    UnknownClassId { id: String, referenced_by: String },

    #[error("Duplicate class id in class model: {0}")]
    DuplicateClassId(String),

    #[error("Generalization cycle detected at class '{0}'")]
    GeneralizationCycle(String),

    #[error("Invalid input format in {source_name}: {message}")]
    InvalidFormat { source_name: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl ReconcileError {
    pub fn missing(source_name: impl Into<String>, what: impl Into<String>) -> Self {
        Self::MissingStructure {
            source_name: source_name.into(),
            what: what.into(),
        }
    }
}
