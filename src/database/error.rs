//! Statement executor error types.

use crate::clause::ClauseError;
use crate::database::driver::DriverError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while configuring instances or running statements.
#[derive(Error, Debug)]
pub enum StatementError {
    #[error("Instance '{0}' is not configured")]
    NotConfigured(String),

    #[error("Instance '{0}' can only be configured once")]
    AlreadyConfigured(String),

    #[error("Failed to connect instance '{instance}' after {attempts} attempt(s): {source}")]
    Connect {
        instance: String,
        attempts: u32,
        #[source]
        source: DriverError,
    },

    #[error("Failed to prepare statement {statement_id}: {message}")]
    Prepare {
        statement_id: String,
        message: String,
    },

    #[error("Failed to execute statement {statement_id}: {message}")]
    Execute {
        statement_id: String,
        message: String,
    },

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Invalid statement template: {0}")]
    Template(String),

    #[error("Log directory {}: {reason}", .path.display())]
    LogDirectory { path: PathBuf, reason: String },

    #[error("Predicate error: {0}")]
    Clause(#[from] ClauseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for statement executor operations.
pub type StatementResult<T> = Result<T, StatementError>;
