//! Error types for workflow parsing and loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that can occur while loading a workflow definition.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The definition file could not be read.
    #[error("Failed to read {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The file is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),

    /// The document is well-formed but structurally invalid.
    #[error("Invalid workflow: {0}")]
    Invalid(String),

    /// The cron expression of a cron-launched workflow does not parse.
    #[error("Invalid cron expression '{0}'")]
    InvalidCron(String),
}
