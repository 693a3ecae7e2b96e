//! Database API - the entry point of waldb.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::config::DatabaseConfig;
use crate::storage::{InvalidNameError, InvalidSeparatorError, StorageError, Table, TableKey};
use crate::transaction::{TableLock, TransactionError, TransactionResult, Tx, TxConfig};

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("root path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid table name: {0}")]
    InvalidName(#[from] InvalidNameError),

    #[error("invalid separator: {0}")]
    InvalidSeparator(#[from] InvalidSeparatorError),

    #[error("invalid json config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database already closed")]
    AlreadyClosed,
}

/// The table set, fixed at open.
struct Registry {
    closed: bool,
    tables: HashMap<TableKey, TableLock>,
}

struct Inner {
    root_dir: PathBuf,
    registry: Mutex<Registry>,
}

/// The main database handle.
///
/// Cheap to clone; clones share the same tables.
#[derive(Clone)]
pub struct Database {
    inner: Arc<Inner>,
}

impl Database {
    /// Open or create a database.
    ///
    /// Creates the root directory if it is missing and opens (or creates)
    /// every configured table. If any table fails to open, the tables opened
    /// so far are closed again before the error is returned.
    pub fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        ensure_root_dir(&config.root_dir)?;

        let mut tables: HashMap<TableKey, TableLock> = HashMap::with_capacity(config.tables.len());
        for key in &config.tables {
            match Table::open(&config.root_dir, key.clone(), &config.separator) {
                Ok(table) => {
                    tables.insert(key.clone(), Arc::new(RwLock::new(table)));
                }
                Err(e) => {
                    for (opened, table) in &tables {
                        if let Err(close_err) = table.write().close() {
                            warn!(table = %opened, error = %close_err, "failed to close table after open error");
                        }
                    }
                    return Err(e.into());
                }
            }
        }

        info!(
            root = %config.root_dir.display(),
            tables = tables.len(),
            "opened database"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                root_dir: config.root_dir,
                registry: Mutex::new(Registry {
                    closed: false,
                    tables,
                }),
            }),
        })
    }

    /// Close every table.
    ///
    /// Waits for running transactions on each table to end. All tables are
    /// closed even if some fail; the first failure is returned.
    pub fn close(&self) -> DatabaseResult<()> {
        // the registry lock is never held while waiting on a table lock
        let tables = {
            let mut registry = self.inner.registry.lock();
            if registry.closed {
                return Err(DatabaseError::AlreadyClosed);
            }
            registry.closed = true;

            let mut tables: Vec<(TableKey, TableLock)> = registry
                .tables
                .iter()
                .map(|(key, table)| (key.clone(), Arc::clone(table)))
                .collect();
            tables.sort_by(|a, b| a.0.cmp(&b.0));
            tables
        };

        let mut first_err = None;
        for (key, table) in &tables {
            if let Err(e) = table.write().close() {
                warn!(table = %key, error = %e, "failed to close table");
                first_err.get_or_insert(e);
            }
        }

        info!(root = %self.inner.root_dir.display(), "closed database");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Prepare a reusable transaction config.
    ///
    /// `read` and `write` must name known tables, and no table may appear
    /// more than once across both lists.
    pub fn prepare_tx<R, W>(&self, read: R, write: W) -> TransactionResult<Arc<TxConfig>>
    where
        R: IntoIterator,
        R::Item: AsRef<str>,
        W: IntoIterator,
        W::Item: AsRef<str>,
    {
        let registry = self.inner.registry.lock();
        if registry.closed {
            return Err(TransactionError::DatabaseClosed);
        }

        let cfg = TxConfig::build(&registry.tables, read, write)?;
        drop(registry);

        let writes = cfg.lock_order().filter(|(_, writable)| *writable).count();
        debug!(
            reads = cfg.len() - writes,
            writes,
            lock_order = ?cfg,
            "prepared transaction config"
        );
        Ok(Arc::new(cfg))
    }

    /// Begin a transaction from `cfg`. Same as [`TxConfig::begin`].
    pub fn begin_tx(&self, cfg: &Arc<TxConfig>) -> Tx {
        cfg.begin()
    }

    /// End `tx`. Same as [`Tx::end`].
    pub fn end_tx(&self, tx: &mut Tx) -> TransactionResult<()> {
        tx.end()
    }

    /// Names of all tables, sorted.
    pub fn tables(&self) -> Vec<TableKey> {
        let registry = self.inner.registry.lock();
        let mut keys: Vec<TableKey> = registry.tables.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Check if a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.inner.registry.lock().tables.contains_key(name)
    }

    /// Get the database root directory.
    pub fn root_dir(&self) -> &Path {
        &self.inner.root_dir
    }

    pub fn is_closed(&self) -> bool {
        self.inner.registry.lock().closed
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("root_dir", &self.inner.root_dir)
            .field("tables", &self.tables())
            .finish()
    }
}

fn ensure_root_dir(path: &Path) -> DatabaseResult<()> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(DatabaseError::NotADirectory(path.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_dir(path).map_err(|source| DatabaseError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(root = %path.display(), "created root directory");
            Ok(())
        }
        Err(source) => Err(DatabaseError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(unix)]
fn create_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}
