//! A single append-only table.
//!
//! A table owns two files under the database root:
//!
//! - `<table>.data`: payloads, each followed by the record separator and the
//!   hex-encoded key so that records can be found in a raw hex dump.
//! - `<table>.index`: one fixed-width [`IndexRecord`] per write.
//!
//! Neither file is ever truncated or rewritten. Overwriting a key appends a
//! new payload and a new index record whose `prev_index_offset` points at the
//! key's previous index record, so the full history of every key stays
//! reachable from its latest record.
//!
//! Tables do no locking of their own. Writers need `&mut Table`, readers need
//! `&Table`; the transaction layer hands those out through per-table
//! reader/writer locks.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::io::{read_full_at, IoContext};
use crate::storage::record::{encode_hex, IndexRecord, IndexRecordWriter, INDEX_RECORD_SIZE};
use crate::storage::types::{Key, RecordSeparator, TableKey, KEY_SIZE, RECORD_SEPARATOR_SIZE};

const TRAILER_SIZE: usize = RECORD_SEPARATOR_SIZE + KEY_SIZE * 2;

struct TableFiles {
    data: File,
    index: File,
}

pub(crate) struct Table {
    key: TableKey,
    data_path: PathBuf,
    index_path: PathBuf,
    /// separator followed by the hex key of the record being written
    trailer: [u8; TRAILER_SIZE],
    writer: IndexRecordWriter,
    files: Option<TableFiles>,
    /// latest index record of every key
    index: HashMap<Key, IndexRecord>,
    /// bytes after the last complete index record, left by an interrupted append
    torn_tail: Option<u64>,
}

impl Table {
    /// Open or create the table's files under `root` and rebuild the
    /// in-memory index from the index log.
    ///
    /// A trailing partial index record is treated as the end of the log. Any
    /// record before it that fails to decode aborts the open.
    pub fn open(root: &Path, key: TableKey, separator: &RecordSeparator) -> StorageResult<Self> {
        let data_path = root.join(key.data_file_name());
        let index_path = root.join(key.index_file_name());

        let data = open_log(&data_path).io_context("open data log", &key)?;
        let index_file = open_log(&index_path).io_context("open index log", &key)?;

        let index_len = index_file
            .metadata()
            .io_context("stat index log", &key)?
            .len();

        let mut index = HashMap::new();
        let mut reader = BufReader::new(&index_file);
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        let mut offset = 0u64;
        let mut position = 0u64;
        loop {
            match reader.read_exact(&mut buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e).io_context("scan index log", &key),
            }

            let record = IndexRecord::decode(&buf, offset).map_err(|source| {
                StorageError::CorruptIndex {
                    table: key.clone(),
                    position,
                    source,
                }
            })?;
            index.insert(record.key, record);

            offset += INDEX_RECORD_SIZE as u64;
            position += 1;
        }
        drop(reader);

        let torn_tail = (index_len > offset).then(|| index_len - offset);
        if let Some(bytes) = torn_tail {
            warn!(
                table = %key,
                bytes,
                valid_records = position,
                "ignoring truncated index record at end of index log"
            );
        }

        debug!(table = %key, entries = index.len(), index_bytes = index_len, "opened table");

        let mut trailer = [0u8; TRAILER_SIZE];
        trailer[..RECORD_SEPARATOR_SIZE].copy_from_slice(separator.as_bytes());

        Ok(Self {
            key,
            data_path,
            index_path,
            trailer,
            writer: IndexRecordWriter::new(),
            files: Some(TableFiles {
                data,
                index: index_file,
            }),
            index,
            torn_tail,
        })
    }

    pub fn key(&self) -> &TableKey {
        &self.key
    }

    pub fn data_path(&self) -> &Path {
        &self.data_path
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    fn files(&self) -> StorageResult<&TableFiles> {
        self.files
            .as_ref()
            .ok_or_else(|| StorageError::Closed(self.key.clone()))
    }

    fn latest(&self, key: &Key) -> StorageResult<&IndexRecord> {
        self.index.get(key).ok_or_else(|| StorageError::KeyNotFound {
            table: self.key.clone(),
            key: *key,
        })
    }

    /// Latest index record for `key`, if the key was ever written.
    pub fn entry(&self, key: &Key) -> Option<&IndexRecord> {
        self.index.get(key)
    }

    /// Number of distinct keys in the table.
    pub fn count(&self) -> usize {
        self.index.len()
    }

    /// Whether `key` has been written. Does not touch the disk.
    pub fn exists(&self, key: &Key) -> bool {
        self.index.contains_key(key)
    }

    /// Read the payload described by `record` into `buf`.
    ///
    /// Reads at most `min(buf.len(), record.data_size)` bytes and returns the
    /// number of bytes read.
    pub fn read_entry(&self, record: &IndexRecord, buf: &mut [u8]) -> StorageResult<usize> {
        let files = self.files()?;
        let len = usize::try_from(record.data_size).map_or(buf.len(), |size| size.min(buf.len()));
        read_full_at(&files.data, &mut buf[..len], record.data_offset)
            .io_context("read data log", &self.key)
    }

    /// Read the current value of `key` into `buf`, returning the byte count.
    pub fn read(&self, key: &Key, buf: &mut [u8]) -> StorageResult<usize> {
        let record = self.latest(key)?;
        self.read_entry(record, buf)
    }

    /// Current value of `key` as a new buffer.
    pub fn get(&self, key: &Key) -> StorageResult<Vec<u8>> {
        let record = self.latest(key)?;
        self.load_entry(record)
    }

    fn load_entry(&self, record: &IndexRecord) -> StorageResult<Vec<u8>> {
        let files = self.files()?;
        let data_len = files
            .data
            .metadata()
            .io_context("stat data log", &self.key)?
            .len();

        // check the range against the log before trusting the size for an allocation
        let size = record
            .data_end()
            .filter(|end| *end <= data_len)
            .and_then(|_| usize::try_from(record.data_size).ok());
        let Some(size) = size else {
            return Err(StorageError::ShortRead {
                table: self.key.clone(),
                read: data_len.saturating_sub(record.data_offset).min(record.data_size),
                expected: record.data_size,
            });
        };

        let mut data = vec![0u8; size];
        let read = self.read_entry(record, &mut data)?;
        if read != size {
            return Err(StorageError::ShortRead {
                table: self.key.clone(),
                read: read as u64,
                expected: record.data_size,
            });
        }
        Ok(data)
    }

    /// Append a new value for `key`.
    ///
    /// The payload is synced to the data log before the index record that
    /// points at it is appended, and the in-memory index only changes once
    /// both are durable. A crash in between leaves unreferenced payload bytes
    /// and the key's previous value intact.
    pub fn put(&mut self, key: Key, data: &[u8]) -> StorageResult<()> {
        if let Some(bytes) = self.torn_tail {
            return Err(StorageError::TornIndexTail {
                table: self.key.clone(),
                bytes,
            });
        }
        let files = self
            .files
            .as_mut()
            .ok_or_else(|| StorageError::Closed(self.key.clone()))?;

        let data_offset = files
            .data
            .seek(SeekFrom::End(0))
            .io_context("seek data log", &self.key)?;
        let index_offset = files
            .index
            .seek(SeekFrom::End(0))
            .io_context("seek index log", &self.key)?;

        encode_hex(&mut self.trailer[RECORD_SEPARATOR_SIZE..], key.as_bytes());
        files
            .data
            .write_all(data)
            .io_context("write data log", &self.key)?;
        files
            .data
            .write_all(&self.trailer)
            .io_context("write data log", &self.key)?;
        files
            .data
            .sync_all()
            .io_context("sync data log", &self.key)?;

        let record = IndexRecord {
            key,
            data_offset,
            data_size: data.len() as u64,
            index_offset,
            prev_index_offset: self.index.get(&key).map(|prev| prev.index_offset),
        };

        let encoded = self.writer.encode(&record);
        if let Err(e) = files.index.write_all(encoded) {
            // a partial record would misalign every record appended after it
            if let Ok(meta) = files.index.metadata() {
                self.torn_tail = meta.len().checked_sub(index_offset).filter(|n| *n > 0);
            }
            return Err(e).io_context("write index log", &self.key);
        }
        files
            .index
            .sync_all()
            .io_context("sync index log", &self.key)?;

        self.index.insert(key, record);
        Ok(())
    }

    /// Read the index record stored at `offset` in the index log.
    fn read_index_record(&self, offset: u64) -> StorageResult<IndexRecord> {
        let files = self.files()?;
        let mut buf = [0u8; INDEX_RECORD_SIZE];
        let n = read_full_at(&files.index, &mut buf, offset)
            .io_context("read index log", &self.key)?;
        if n != INDEX_RECORD_SIZE || offset % INDEX_RECORD_SIZE as u64 != 0 {
            return Err(StorageError::BrokenLink {
                table: self.key.clone(),
                offset,
            });
        }

        IndexRecord::decode(&buf, offset).map_err(|source| StorageError::CorruptIndex {
            table: self.key.clone(),
            position: offset / INDEX_RECORD_SIZE as u64,
            source,
        })
    }

    /// Visit every index record ever written for `key`, newest first.
    ///
    /// Stops after the key's first record, or as soon as `visit` returns an
    /// error, which is then returned.
    pub fn range_rev_entries<F, E>(&self, key: &Key, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&IndexRecord) -> Result<(), E>,
        E: From<StorageError>,
    {
        let mut current = *self.latest(key)?;
        loop {
            visit(&current)?;

            let Some(prev) = current.prev_index_offset else {
                return Ok(());
            };
            let record = self.read_index_record(prev)?;
            // links always point backwards at the same key
            if prev >= current.index_offset || record.key != *key {
                return Err(StorageError::BrokenLink {
                    table: self.key.clone(),
                    offset: prev,
                }
                .into());
            }
            current = record;
        }
    }

    /// Every value ever written for `key`, newest first.
    pub fn history(&self, key: &Key) -> StorageResult<Vec<Vec<u8>>> {
        let mut values = Vec::new();
        self.range_rev_entries(key, |record| {
            values.push(self.load_entry(record)?);
            Ok::<_, StorageError>(())
        })?;
        Ok(values)
    }

    /// Sync and release both files.
    ///
    /// Both files are always released; the first error is reported. The
    /// in-memory index is dropped as well, reopening rebuilds it from disk.
    pub fn close(&mut self) -> StorageResult<()> {
        let Some(files) = self.files.take() else {
            return Ok(());
        };
        self.index.clear();

        let data_res = files.data.sync_all().io_context("sync data log", &self.key);
        let index_res = files.index.sync_all().io_context("sync index log", &self.key);
        drop(files);

        debug!(table = %self.key, "closed table");
        data_res.and(index_res)
    }
}

fn open_log(path: &Path) -> io::Result<File> {
    OpenOptions::new()
        .read(true)
        .append(true)
        .create(true)
        .open(path)
}
