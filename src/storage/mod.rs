//! storage layer for waldb
//!
//! this module implements the per-table append-only storage engine. The upper
//! layers (database, transactions) use this API and never touch the log files
//! directly.
//!
//!  # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Table                              │
//! │   (in-memory index: key -> latest index record)             │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               │                             │
//!               ▼                             ▼
//!        ┌─────────────┐               ┌─────────────┐
//!        │  data log   │               │  index log  │
//!        │ (payloads)  │◄──offsets─────│  (records)  │
//!        └─────────────┘               └─────────────┘
//!                                             │
//!                                             ▼
//!                                      ┌─────────────┐
//!                                      │   record    │
//!                                      │   (codec)   │
//!                                      └─────────────┘
//! ```
//!
//! Every index record also links to the previous record for the same key, so
//! the index log doubles as a per-key, newest-first history.

mod error;
mod io;
mod record;
mod table;
mod types;

pub use error::{StorageError, StorageResult};
pub use record::{DecodeError, IndexRecord, IndexRecordWriter, INDEX_RECORD_SIZE, NO_PREV_INDEX};
pub use types::{
    InvalidNameError, InvalidSeparatorError, Key, RecordSeparator, TableKey, KEY_SIZE,
    RECORD_SEPARATOR_SIZE,
};

pub(crate) use table::Table;
