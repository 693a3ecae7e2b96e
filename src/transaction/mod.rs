//! Transactions for waldb.
//!
//! This module implements lock-based transactions over one or more tables.
//! A [`TxConfig`] is prepared once from the database, naming the tables a
//! transaction may read and write. Every [`Tx`] begun from it takes a shared
//! lock on each read table and an exclusive lock on each write table, always
//! in the config's sorted order, and releases them in reverse on `end`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         TxConfig                            │
//! │  (validated participants, sorted by table key, reusable)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ begin
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                            Tx                               │
//! │   (held table locks, fluent first-error-wins chain)         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ table
//!                              ▼
//!                       ┌─────────────┐
//!                       │   TxTable   │
//!                       │ (per table) │
//!                       └─────────────┘
//! ```
//!
//! Writes are durable as soon as each `put` returns. There is no rollback and
//! no atomicity across tables.
//!
//! # Usage
//!
//! ```no_run
//! use waldb::db::{Database, DatabaseConfig};
//! use waldb::storage::{Key, TableKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::new("/tmp/waldb")
//!     .tables(TableKey::parse_all(["users", "events"])?);
//! let db = Database::open(config)?;
//!
//! let cfg = db.prepare_tx(["users"], ["events"])?;
//!
//! let mut tx = cfg.begin();
//! tx.put("events", Key::from_u64(1), b"signup");
//! let user = tx.get("users", &Key::from_u64(1));
//! if let Some(err) = tx.err() {
//!     eprintln!("chain failed: {err}");
//! }
//! tx.end()?;
//! # let _ = user;
//! # Ok(())
//! # }
//! ```

mod config;
mod context;
mod error;

pub(crate) use config::TableLock;
pub use config::TxConfig;
pub use context::{Tx, TxTable};
pub use error::{TransactionError, TransactionResult};
