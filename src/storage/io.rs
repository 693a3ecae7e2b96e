//! Positional file reads and I/O error context.

use std::fs::File;
use std::io;

use crate::storage::error::StorageError;
use crate::storage::types::TableKey;

/// Attach the failing operation and table to an I/O error.
pub(crate) trait IoContext<T> {
    fn io_context(self, op: &'static str, table: &TableKey) -> Result<T, StorageError>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn io_context(self, op: &'static str, table: &TableKey) -> Result<T, StorageError> {
        self.map_err(|source| StorageError::Io {
            op,
            table: table.clone(),
            source,
        })
    }
}

/// Read into `buf` starting at `offset` without moving the file cursor.
///
/// Keeps reading until `buf` is full or the file ends and returns the number
/// of bytes read. Shared readers of the same table can call this concurrently.
pub(crate) fn read_full_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<usize> {
    let mut total = 0;
    while !buf.is_empty() {
        match read_at(file, buf, offset) {
            Ok(0) => break,
            Ok(n) => {
                total += n;
                offset += n as u64;
                buf = &mut buf[n..];
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(total)
}

#[cfg(unix)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn read_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}
