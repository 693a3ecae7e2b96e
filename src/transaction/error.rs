//! Transaction error types.

use thiserror::Error;

use crate::storage::{StorageError, TableKey};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur while preparing or running transactions.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The transaction has already been ended.
    #[error("transaction is done")]
    Done,

    /// The table was not part of the transaction's config.
    #[error("table \"{0}\" not bound to tx")]
    TableNotInTx(String),

    /// The table was bound for reading only.
    #[error("table \"{0}\" not writable in tx")]
    TableNotWritable(TableKey),

    /// A table was named twice while preparing a config.
    #[error("table \"{0}\" locked twice")]
    TableListedTwice(TableKey),

    /// A table named while preparing a config does not exist.
    #[error("table \"{0}\" does not exist")]
    UnknownTable(String),

    /// The database was closed before the config was prepared.
    #[error("database is closed")]
    DatabaseClosed,
}

impl TransactionError {
    /// Check if this error was raised while validating a config.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TransactionError::TableListedTwice(_) | TransactionError::UnknownTable(_)
        )
    }

    /// Check if this error means a key was missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransactionError::Storage(e) if e.is_not_found())
    }
}
