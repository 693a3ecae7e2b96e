//! Storage layer error types
//!
//! All errors that can occur during table operations are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use thiserror::Error;

use crate::storage::record::DecodeError;
use crate::storage::types::{Key, TableKey};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// a file operation failed
    #[error("io error during {op} on table {table}: {source}")]
    Io {
        op: &'static str,
        table: TableKey,
        source: std::io::Error,
    },

    /// the key has never been written to the table
    #[error("key not found: table={table}, key={key}")]
    KeyNotFound { table: TableKey, key: Key },

    /// the data log returned fewer bytes than the index promised
    #[error("short read on table {table}: read {read}, expected {expected}")]
    ShortRead {
        table: TableKey,
        read: u64,
        expected: u64,
    },

    /// an index record in the middle of the index log could not be decoded
    #[error("corrupt index record {position} in table {table}: {source}")]
    CorruptIndex {
        table: TableKey,
        position: u64,
        source: DecodeError,
    },

    /// a history link does not lead to an earlier record of the same key
    #[error("broken history link in table {table} at index offset {offset}")]
    BrokenLink { table: TableKey, offset: u64 },

    /// a partial index record sits at the end of the index log
    #[error("table {table} has {bytes} stray bytes at the end of its index log, refusing to append")]
    TornIndexTail { table: TableKey, bytes: u64 },

    /// the table has been closed
    #[error("table is closed: {0}")]
    Closed(TableKey),
}

impl StorageError {
    /// check if this error indicates the key doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::KeyNotFound { .. })
    }

    /// check if this error indicates on-disk data disagrees with the index
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            StorageError::ShortRead { .. }
                | StorageError::CorruptIndex { .. }
                | StorageError::BrokenLink { .. }
                | StorageError::TornIndexTail { .. }
        )
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
