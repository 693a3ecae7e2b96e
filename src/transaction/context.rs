//! Live transactions.
//!
//! A [`Tx`] holds the table locks named by its [`TxConfig`] from
//! [`TxConfig::begin`] until [`Tx::end`]. Tables are reached either through
//! [`Tx::table`], which returns a [`TxTable`] handle and reports errors per
//! call, or through the fluent methods on `Tx` itself, which record the first
//! error and turn every later call into a no-op.
//!
//! Writes go straight to the table logs. There is no rollback and no
//! atomicity across tables: whatever was written before an error stays
//! written.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;
use tracing::{debug, trace};
use ulid::Ulid;

use crate::storage::{IndexRecord, Key, StorageError, Table, TableKey};
use crate::transaction::config::TxConfig;
use crate::transaction::error::{TransactionError, TransactionResult};

/// A held table lock.
enum TableGuard {
    Read(ArcRwLockReadGuard<RawRwLock, Table>),
    Write(ArcRwLockWriteGuard<RawRwLock, Table>),
}

impl TableGuard {
    fn table(&self) -> &Table {
        match self {
            TableGuard::Read(guard) => &**guard,
            TableGuard::Write(guard) => &**guard,
        }
    }

    fn table_mut(&mut self) -> Option<&mut Table> {
        match self {
            TableGuard::Read(_) => None,
            TableGuard::Write(guard) => Some(&mut **guard),
        }
    }
}

/// An open transaction.
///
/// A `Tx` is not meant to be shared between threads; run one transaction per
/// thread and share the [`TxConfig`] instead.
///
/// Besides [`Tx::table`], `Tx` offers a fluent API: [`Tx::put`] and
/// [`Tx::read`] return the transaction itself, [`Tx::get`] and [`Tx::exists`]
/// return plain values. Each of them does nothing once the transaction is done
/// or has recorded an error, and records its own error otherwise. A chain of
/// calls therefore needs a single check of [`Tx::err`] at the end, and nothing
/// after the first failure has any effect.
pub struct Tx {
    id: String,
    started_at: DateTime<Utc>,
    cfg: Arc<TxConfig>,
    /// held locks, in acquisition order
    guards: Vec<TableGuard>,
    done: bool,
    /// set by the first failing fluent call; stays set after `take_err`
    failed: bool,
    err: Option<TransactionError>,
}

impl Tx {
    /// Acquire every lock in `cfg`'s order: exclusive for write tables, shared
    /// for read tables. Blocks until all are held.
    pub(crate) fn begin(cfg: Arc<TxConfig>) -> Self {
        let id = Ulid::new().to_string().to_lowercase();

        let guards = cfg
            .participants()
            .iter()
            .map(|p| {
                if p.writable {
                    TableGuard::Write(p.table.write_arc())
                } else {
                    TableGuard::Read(p.table.read_arc())
                }
            })
            .collect();

        trace!(tx_id = %id, tables = cfg.len(), "began transaction");

        Self {
            id,
            started_at: Utc::now(),
            cfg,
            guards,
            done: false,
            failed: false,
            err: None,
        }
    }

    /// Unique transaction ID.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// When every lock was acquired.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// The config this transaction was started from.
    pub fn config(&self) -> &Arc<TxConfig> {
        &self.cfg
    }

    /// Whether [`Tx::end`] has been called.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Release every lock, last acquired first.
    fn release(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }

    /// End the transaction, releasing its locks in reverse acquisition order.
    ///
    /// Ending a transaction twice is an error.
    pub fn end(&mut self) -> TransactionResult<()> {
        if self.done {
            return Err(TransactionError::Done);
        }

        self.release();
        self.done = true;

        let held = Utc::now() - self.started_at;
        trace!(
            tx_id = %self.id,
            held_us = held.num_microseconds().unwrap_or(i64::MAX),
            "ended transaction"
        );
        Ok(())
    }

    /// Direct access to a table bound to this transaction.
    ///
    /// Not part of the fluent API: errors are returned, not recorded.
    pub fn table(&mut self, table: &str) -> TransactionResult<TxTable<'_>> {
        if self.done {
            return Err(TransactionError::Done);
        }
        let idx = self
            .cfg
            .position(table)
            .ok_or_else(|| TransactionError::TableNotInTx(table.to_string()))?;

        Ok(TxTable {
            key: &self.cfg.participants()[idx].key,
            guard: &mut self.guards[idx],
        })
    }

    // ==================== Fluent API ====================

    fn blocked(&self) -> bool {
        self.done || self.failed
    }

    fn record(&mut self, err: TransactionError) {
        self.failed = true;
        self.err = Some(err);
    }

    /// The first error recorded by a fluent call, if any.
    pub fn err(&self) -> Option<&TransactionError> {
        self.err.as_ref()
    }

    /// Take the recorded error.
    ///
    /// The transaction stays failed: later fluent calls remain no-ops.
    pub fn take_err(&mut self) -> Option<TransactionError> {
        self.err.take()
    }

    /// Put `value` under `key` in `table`.
    pub fn put(&mut self, table: &str, key: Key, value: &[u8]) -> &mut Self {
        if self.blocked() {
            return self;
        }
        if let Err(e) = self.table(table).and_then(|mut t| t.put(key, value)) {
            self.record(e);
        }
        self
    }

    /// Read the value of `key` in `table` into `buf`.
    ///
    /// At most `buf.len()` bytes are read, and `buf` is truncated to the
    /// number of bytes actually read. `buf` is left untouched if the call is
    /// skipped or fails.
    pub fn read(&mut self, table: &str, key: &Key, buf: &mut Vec<u8>) -> &mut Self {
        if self.blocked() {
            return self;
        }
        match self.table(table).and_then(|t| t.read(key, buf)) {
            Ok(n) => buf.truncate(n),
            Err(e) => self.record(e),
        }
        self
    }

    /// The value of `key` in `table`, or `None` if the transaction has failed
    /// or this call fails.
    pub fn get(&mut self, table: &str, key: &Key) -> Option<Vec<u8>> {
        if self.blocked() {
            return None;
        }
        match self.table(table).and_then(|t| t.get(key)) {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    /// Whether `key` exists in `table`; `false` if the transaction has failed
    /// or `table` is not bound to it.
    pub fn exists(&mut self, table: &str, key: &Key) -> bool {
        if self.blocked() {
            return false;
        }
        match self.table(table).map(|t| t.exists(key)) {
            Ok(found) => found,
            Err(e) => {
                self.record(e);
                false
            }
        }
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        if !self.done {
            debug!(tx_id = %self.id, "transaction dropped without end, releasing locks");
            self.release();
        }
    }
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("tables", &self.cfg)
            .field("done", &self.done)
            .field("err", &self.err)
            .finish()
    }
}

/// A table bound to an open transaction.
///
/// The handle borrows the transaction, so it cannot outlive [`Tx::end`].
pub struct TxTable<'a> {
    key: &'a TableKey,
    guard: &'a mut TableGuard,
}

impl TxTable<'_> {
    pub fn key(&self) -> &TableKey {
        self.key
    }

    /// Whether the table was bound for writing.
    pub fn is_writable(&self) -> bool {
        matches!(self.guard, TableGuard::Write(_))
    }

    /// Read the value of `key` into `buf`, at most `buf.len()` bytes.
    pub fn read(&self, key: &Key, buf: &mut [u8]) -> TransactionResult<usize> {
        Ok(self.guard.table().read(key, buf)?)
    }

    /// The value of `key` as a new buffer.
    ///
    /// Prefer [`TxTable::read`] when an upper bound on the value size is known.
    pub fn get(&self, key: &Key) -> TransactionResult<Vec<u8>> {
        Ok(self.guard.table().get(key)?)
    }

    pub fn exists(&self, key: &Key) -> bool {
        self.guard.table().exists(key)
    }

    /// Number of distinct keys in the table.
    pub fn count(&self) -> usize {
        self.guard.table().count()
    }

    /// Put `data` under `key`.
    ///
    /// The write is durable when this returns. Writes to other tables in the
    /// same transaction are not atomic with this one.
    pub fn put(&mut self, key: Key, data: &[u8]) -> TransactionResult<()> {
        let table = self
            .guard
            .table_mut()
            .ok_or_else(|| TransactionError::TableNotWritable(self.key.clone()))?;
        Ok(table.put(key, data)?)
    }

    /// Visit every version of `key`, newest first. See
    /// [`IndexRecord`] for what each visit receives; payloads can be loaded
    /// with [`TxTable::read_entry`].
    pub fn range_rev_entries<F, E>(&self, key: &Key, visit: F) -> Result<(), E>
    where
        F: FnMut(&IndexRecord) -> Result<(), E>,
        E: From<StorageError>,
    {
        self.guard.table().range_rev_entries(key, visit)
    }

    /// Read the payload of a historical `record` into `buf`.
    pub fn read_entry(&self, record: &IndexRecord, buf: &mut [u8]) -> TransactionResult<usize> {
        Ok(self.guard.table().read_entry(record, buf)?)
    }

    /// Every value ever written for `key`, newest first.
    pub fn history(&self, key: &Key) -> TransactionResult<Vec<Vec<u8>>> {
        Ok(self.guard.table().history(key)?)
    }
}
