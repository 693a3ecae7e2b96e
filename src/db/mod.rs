//! High-level Database API.
//!
//! [`Database`] owns the tables named in its [`DatabaseConfig`] and the
//! reader/writer lock guarding each one. Transactions are prepared from it with
//! [`Database::prepare_tx`].

mod api;
mod config;

pub use api::{Database, DatabaseError, DatabaseResult};
pub use config::DatabaseConfig;
