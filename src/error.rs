//! Error types for bulk operations

use std::time::Duration;
use thiserror::Error;

/// Bulk operation errors
#[derive(Error, Debug)]
pub enum BulkError {
    /// Entity unmapped, table unresolved, or options inconsistent with the schema.
    /// Raised before any SQL is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A generated batch failed to execute
    #[error("Execution error in batch {batch}: {source}")]
    Execution {
        batch: usize,
        #[source]
        source: sqlx::Error,
    },

    /// A generated batch exceeded the command timeout
    #[error("Batch {batch} timed out after {timeout:?}")]
    Timeout { batch: usize, timeout: Duration },

    /// Cancellation observed at an I/O boundary
    #[error("Bulk operation cancelled")]
    Cancelled,

    /// Begin, commit or rollback failed
    #[error("Transaction error: {0}")]
    Transaction(#[source] sqlx::Error),

    /// sqlx database error
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Schema descriptor parse error
    #[error("Invalid schema descriptor: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BulkError {
    /// True when the error was raised before any batch was generated
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::Json(_))
    }

    /// True for statement failures, including timeouts
    pub fn is_execution(&self) -> bool {
        matches!(self, Self::Execution { .. } | Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
