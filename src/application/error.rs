//! Application-level errors (wraps domain errors)

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add ledger/config context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("no ledger at {0} (run `undivided init` first)")]
    LedgerNotInitialized(PathBuf),

    #[error("ledger already exists: {0} (use --force to replace it)")]
    LedgerAlreadyExists(PathBuf),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    /// Wrap a ledger store failure with the action and location.
    pub fn store(action: &str, location: &Path, source: std::io::Error) -> Self {
        Self::OperationFailed {
            context: format!("{} ledger {}", action, location.display()),
            source: Box::new(source),
        }
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
