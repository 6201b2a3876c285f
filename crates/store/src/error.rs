//! Error types for the store
//!
//! Covers the upgrade engine's failure classes: version-table
//! initialization, step execution, version persistence, and transaction
//! lifecycle failures. Every error aborts the in-flight upgrade; the
//! engine never retries on its own.

use crate::dialect::Dialect;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Error types for store and upgrade operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Failure creating or reading the version-tracking table
    #[error("Version table initialization failed: {0}")]
    Initialization(String),

    /// A migration step's SQL or logic failed
    #[error("Migration step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: Box<StoreError>,
    },

    /// Failure writing the new schema version
    #[error("Failed to persist schema version: {0}")]
    VersionPersist(String),

    /// Failure beginning, committing, or rolling back a transaction
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// A step cannot serve the configured dialect
    ///
    /// The built-in steps cover every dialect exhaustively, so this is
    /// returned only by externally implemented steps that fail closed on
    /// a dialect they cannot serve.
    #[error("Dialect {dialect} is not supported by {operation}")]
    UnsupportedDialect {
        dialect: Dialect,
        operation: &'static str,
    },

    /// An unrecognized dialect name or connection URL scheme
    #[error("Unknown database dialect: {0}")]
    UnknownDialect(String),

    /// Raw driver error surfaced from a migration step
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
