//! Prepared transaction configs and lock ordering.
//!
//! A [`TxConfig`] names the tables a transaction may read and write. It is
//! built once, validated against the database's table registry, and then
//! reused for any number of transactions.
//!
//! The participants are sorted by table key, and every transaction acquires
//! its locks in that order. Any two configs that share tables A and B therefore
//! always lock A and B in the same relative order, which rules out circular
//! waits between concurrent transactions.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::storage::{Table, TableKey};
use crate::transaction::context::Tx;
use crate::transaction::error::{TransactionError, TransactionResult};

/// A table together with the reader/writer lock that guards it.
pub(crate) type TableLock = Arc<RwLock<Table>>;

/// One table taking part in a transaction.
pub(crate) struct Participant {
    pub(crate) key: TableKey,
    pub(crate) writable: bool,
    pub(crate) table: TableLock,
}

/// A prepared, immutable transaction plan.
///
/// Safe to share across threads; each [`TxConfig::begin`] creates an
/// independent transaction.
pub struct TxConfig {
    /// participants sorted by table key
    lock_order: Vec<Participant>,
    /// table key -> index into `lock_order`
    positions: HashMap<TableKey, usize>,
}

impl TxConfig {
    /// Validate the requested tables against `registry` and compute the lock
    /// order.
    pub(crate) fn build<R, W>(
        registry: &HashMap<TableKey, TableLock>,
        read: R,
        write: W,
    ) -> TransactionResult<Self>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        W: IntoIterator,
        W::Item: AsRef<str>,
    {
        let mut lock_order: Vec<Participant> = Vec::new();

        let requested = read
            .into_iter()
            .map(|name| (name.as_ref().to_owned(), false))
            .chain(write.into_iter().map(|name| (name.as_ref().to_owned(), true)));

        for (name, writable) in requested {
            let (key, table) = registry
                .get_key_value(name.as_str())
                .ok_or(TransactionError::UnknownTable(name))?;

            if lock_order.iter().any(|p| &p.key == key) {
                return Err(TransactionError::TableListedTwice(key.clone()));
            }

            lock_order.push(Participant {
                key: key.clone(),
                writable,
                table: Arc::clone(table),
            });
        }

        // stable, total order shared by every config
        lock_order.sort_by(|a, b| a.key.cmp(&b.key));

        let positions = lock_order
            .iter()
            .enumerate()
            .map(|(i, p)| (p.key.clone(), i))
            .collect();

        Ok(Self {
            lock_order,
            positions,
        })
    }

    pub(crate) fn participants(&self) -> &[Participant] {
        &self.lock_order
    }

    pub(crate) fn position(&self, table: &str) -> Option<usize> {
        self.positions.get(table).copied()
    }

    /// Tables in lock acquisition order, with their writability.
    pub fn lock_order(&self) -> impl Iterator<Item = (&TableKey, bool)> + '_ {
        self.lock_order.iter().map(|p| (&p.key, p.writable))
    }

    /// Whether `table` is part of this config.
    pub fn contains(&self, table: &str) -> bool {
        self.positions.contains_key(table)
    }

    /// `Some(true)` for write tables, `Some(false)` for read tables, `None`
    /// for tables outside the config.
    pub fn is_writable(&self, table: &str) -> Option<bool> {
        self.position(table).map(|i| self.lock_order[i].writable)
    }

    /// Number of tables in the config.
    pub fn len(&self) -> usize {
        self.lock_order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_order.is_empty()
    }

    /// Begin a transaction, blocking until every table lock is held.
    ///
    /// The returned [`Tx`] must be ended with [`Tx::end`]; dropping it also
    /// releases the locks.
    pub fn begin(self: &Arc<Self>) -> Tx {
        Tx::begin(Arc::clone(self))
    }

    /// Run `f` inside a transaction.
    ///
    /// The transaction is always ended after `f` returns. `f`'s error takes
    /// precedence over an error from ending the transaction.
    ///
    /// The `Tx` passed to `f` must not be kept after `f` returns.
    pub fn run_tx<F, T>(self: &Arc<Self>, f: F) -> TransactionResult<T>
    where
        F: FnOnce(&mut Tx) -> TransactionResult<T>,
    {
        let mut tx = self.begin();
        let result = f(&mut tx);
        let ended = tx.end();

        match result {
            Ok(value) => ended.map(|_| value),
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for TxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.lock_order.iter().map(|p| (p.key.as_str(), p.writable)))
            .finish()
    }
}
