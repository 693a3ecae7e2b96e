//! waldb - an embeddable, append-only, multi-table storage engine
//!
//! Every table is a pair of append-only logs on disk: a data log holding the
//! payloads and an index log of fixed-width records that point into it. Values
//! are never overwritten; each write to a key links back to the previous one,
//! so a key's whole history can be walked newest first.
//!
//! Tables are accessed through transactions that take per-table
//! reader/writer locks in a fixed global order, so concurrent transactions
//! over overlapping tables cannot deadlock.
//!
//! # Example
//!
//! ```no_run
//! use waldb::db::{Database, DatabaseConfig};
//! use waldb::storage::{Key, TableKey};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DatabaseConfig::new("./my_database")
//!     .tables(TableKey::parse_all(["users"])?);
//! let db = Database::open(config)?;
//!
//! let cfg = db.prepare_tx(Vec::<&str>::new(), ["users"])?;
//! let value = cfg.run_tx(|tx| {
//!     let mut users = tx.table("users")?;
//!     users.put(Key::from_u64(1), b"alice")?;
//!     users.get(&Key::from_u64(1))
//! })?;
//! assert_eq!(value, b"alice");
//!
//! db.close()?;
//! # Ok(())
//! # }
//! ```

pub mod db;
pub mod storage;
pub mod transaction;

pub use db::{Database, DatabaseConfig, DatabaseError, DatabaseResult};
pub use storage::{Key, StorageError, TableKey};
pub use transaction::{TransactionError, Tx, TxConfig, TxTable};
