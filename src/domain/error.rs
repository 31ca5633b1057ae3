//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent rejected ledger input.
///
/// The calculator itself never fails; these come from the validation layer
/// that runs before a mutation is committed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("owner not found: {0}")]
    NodeNotFound(String),

    #[error("person not found: {0}")]
    PersonNotFound(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    #[error("invalid percentage: {0:?}")]
    InvalidPercentage(String),

    #[error("percentage must be between 0 and {available}")]
    PercentageOutOfRange {
        requested: f64,
        /// Remaining interest of the source, rendered as a fraction
        available: String,
    },

    #[error("an owner cannot convey to itself: {0}")]
    SelfTransfer(String),

    #[error("transfer {from} -> {to} would create a cycle")]
    CycleWouldForm { from: String, to: String },

    #[error("name must not be empty")]
    EmptyName,

    #[error("document needs an instrument number, book, or title")]
    UnidentifiableDocument,

    #[error("owner {node} has no transfer #{index}")]
    TransferNotFound { node: String, index: usize },

    #[error("cannot remove the last transfer of {0}; remove the owner instead")]
    LastTransfer(String),
}
