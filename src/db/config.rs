//! Database configuration.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::db::api::{DatabaseError, DatabaseResult};
use crate::storage::{RecordSeparator, TableKey};

/// Database configuration options.
///
/// Built in code with the builder methods, or loaded from JSON:
///
/// ```json
/// {
///   "root_directory": "/var/lib/waldb",
///   "table_names": ["users", "events"],
///   "separator": "<62 hex chars>"
/// }
/// ```
///
/// Missing fields take their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Directory holding the table files. Created if missing.
    #[serde(rename = "root_directory")]
    pub root_dir: PathBuf,
    /// Tables to open. The set is fixed for the lifetime of the database.
    #[serde(rename = "table_names")]
    pub tables: Vec<TableKey>,
    /// Marker written after every payload in the data logs.
    ///
    /// Pick your own value; the default is public.
    pub separator: RecordSeparator,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from(".waldb"),
            tables: Vec::new(),
            separator: RecordSeparator::default(),
        }
    }
}

impl DatabaseConfig {
    /// Create a new configuration rooted at `root_dir`.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Default::default()
        }
    }

    /// Set the tables to open.
    pub fn tables(mut self, tables: impl IntoIterator<Item = TableKey>) -> Self {
        self.tables = tables.into_iter().collect();
        self
    }

    /// Add one table.
    pub fn table(mut self, table: TableKey) -> Self {
        self.tables.push(table);
        self
    }

    /// Set the record separator.
    pub fn separator(mut self, separator: RecordSeparator) -> Self {
        self.separator = separator;
        self
    }

    /// Set the record separator from its 62-char hex form.
    pub fn separator_hex(self, hex: &str) -> DatabaseResult<Self> {
        Ok(self.separator(RecordSeparator::from_hex(hex)?))
    }

    /// Parse a configuration from JSON.
    pub fn from_json_str(json: &str) -> DatabaseResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> DatabaseResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| DatabaseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Serialize the configuration as pretty JSON.
    pub fn to_json_string(&self) -> DatabaseResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the configuration for problems the type system does not rule out.
    pub fn validate(&self) -> DatabaseResult<()> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(DatabaseError::InvalidConfig("empty root directory".into()));
        }

        let mut seen = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            if !seen.insert(table) {
                return Err(DatabaseError::InvalidConfig(format!(
                    "table \"{table}\" listed twice"
                )));
            }
        }
        Ok(())
    }
}
