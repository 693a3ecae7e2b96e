//! Index record codec.
//!
//! Every write to a table appends one fixed-width, plain-text index record to
//! the table's index log:
//!
//! ```text
//! data_offset(16 hex) SP data_size(16 hex) SP key(32 hex) SP prev_index_offset(16 hex) LF
//! ```
//!
//! Integers are encoded big-endian before hex expansion, so the encoded fields
//! sort the same way as the numbers they hold. A record's own offset in the
//! index log is not stored; it is recovered from the record's position while
//! scanning.

use thiserror::Error;

use crate::storage::types::{Key, KEY_SIZE};

/// Size of one encoded index record in bytes.
pub const INDEX_RECORD_SIZE: usize = 16 + 1 + 16 + 1 + KEY_SIZE * 2 + 1 + 16 + 1;

/// On-disk value of `prev_index_offset` for a key's first write.
pub const NO_PREV_INDEX: u64 = i64::MAX as u64;

const FIELD_DELIMITER: u8 = b' ';
const RECORD_TERMINATOR: u8 = b'\n';

const OFFSET_POS: usize = 0;
const SIZE_POS: usize = OFFSET_POS + 17;
const KEY_POS: usize = SIZE_POS + 17;
const PREV_POS: usize = KEY_POS + KEY_SIZE * 2 + 1;

/// Location of one version of a key's value, plus the link to the version
/// written before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    /// key this record belongs to
    pub key: Key,
    /// offset of the payload in the data log
    pub data_offset: u64,
    /// payload length in bytes
    pub data_size: u64,
    /// offset of this record in the index log
    pub index_offset: u64,
    /// offset of the previous record for the same key, if any
    pub prev_index_offset: Option<u64>,
}

impl IndexRecord {
    /// end of the payload range in the data log, `None` if it overflows
    pub fn data_end(&self) -> Option<u64> {
        self.data_offset.checked_add(self.data_size)
    }

    /// decode a record from exactly [`INDEX_RECORD_SIZE`] bytes.
    ///
    /// `index_offset` is not part of the encoding and must be supplied by the
    /// caller.
    pub fn decode(buf: &[u8], index_offset: u64) -> Result<Self, DecodeError> {
        if buf.len() != INDEX_RECORD_SIZE {
            return Err(DecodeError::WrongSize {
                expected: INDEX_RECORD_SIZE,
                actual: buf.len(),
            });
        }

        for pos in [SIZE_POS - 1, KEY_POS - 1, PREV_POS - 1] {
            if buf[pos] != FIELD_DELIMITER {
                return Err(DecodeError::BadDelimiter { position: pos });
            }
        }
        if buf[INDEX_RECORD_SIZE - 1] != RECORD_TERMINATOR {
            return Err(DecodeError::BadDelimiter {
                position: INDEX_RECORD_SIZE - 1,
            });
        }

        let data_offset = decode_u64(&buf[OFFSET_POS..OFFSET_POS + 16], "data_offset")?;
        let data_size = decode_u64(&buf[SIZE_POS..SIZE_POS + 16], "data_size")?;

        let mut key = [0u8; KEY_SIZE];
        hex::decode_to_slice(&buf[KEY_POS..KEY_POS + KEY_SIZE * 2], &mut key)
            .map_err(|source| DecodeError::InvalidHex { field: "key", source })?;

        let prev = decode_u64(&buf[PREV_POS..PREV_POS + 16], "prev_index_offset")?;

        Ok(Self {
            key: Key::new(key),
            data_offset,
            data_size,
            index_offset,
            prev_index_offset: (prev != NO_PREV_INDEX).then_some(prev),
        })
    }
}

fn decode_u64(field: &[u8], name: &'static str) -> Result<u64, DecodeError> {
    let mut raw = [0u8; 8];
    hex::decode_to_slice(field, &mut raw)
        .map_err(|source| DecodeError::InvalidHex { field: name, source })?;
    Ok(u64::from_be_bytes(raw))
}

/// Errors produced when decoding an index record.
#[derive(Debug, Error, PartialEq)]
pub enum DecodeError {
    #[error("index record has {actual} bytes, expected {expected}")]
    WrongSize { expected: usize, actual: usize },

    #[error("missing delimiter at byte {position}")]
    BadDelimiter { position: usize },

    #[error("invalid hex in {field}: {source}")]
    InvalidHex {
        field: &'static str,
        source: hex::FromHexError,
    },
}

/// Encodes index records into a reusable scratch buffer.
///
/// The slice returned by [`IndexRecordWriter::encode`] borrows the writer, so
/// it has to be written out (or copied) before the next record is encoded.
pub struct IndexRecordWriter {
    buf: [u8; INDEX_RECORD_SIZE],
}

impl IndexRecordWriter {
    /// create a writer with delimiters and terminator already in place
    pub fn new() -> Self {
        let mut buf = [FIELD_DELIMITER; INDEX_RECORD_SIZE];
        buf[INDEX_RECORD_SIZE - 1] = RECORD_TERMINATOR;
        Self { buf }
    }

    /// encode `record`, returning a view into the scratch buffer
    pub fn encode(&mut self, record: &IndexRecord) -> &[u8] {
        let prev = record.prev_index_offset.unwrap_or(NO_PREV_INDEX);

        encode_u64(&mut self.buf[OFFSET_POS..OFFSET_POS + 16], record.data_offset);
        encode_u64(&mut self.buf[SIZE_POS..SIZE_POS + 16], record.data_size);
        encode_hex(
            &mut self.buf[KEY_POS..KEY_POS + KEY_SIZE * 2],
            record.key.as_bytes(),
        );
        encode_u64(&mut self.buf[PREV_POS..PREV_POS + 16], prev);

        &self.buf
    }
}

impl Default for IndexRecordWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_u64(out: &mut [u8], value: u64) {
    encode_hex(out, &value.to_be_bytes());
}

pub(crate) fn encode_hex(out: &mut [u8], bytes: &[u8]) {
    // field positions are constant, so the lengths always line up
    let res = hex::encode_to_slice(bytes, out);
    debug_assert!(res.is_ok(), "hex output slice has the wrong length");
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(prev: Option<u64>) -> IndexRecord {
        IndexRecord {
            key: Key::from_u64(42),
            data_offset: 0x1234,
            data_size: 5,
            index_offset: 0,
            prev_index_offset: prev,
        }
    }

    #[test]
    fn test_record_size() {
        assert_eq!(INDEX_RECORD_SIZE, 84);
    }

    #[test]
    fn test_encoding_is_readable_text() {
        let mut writer = IndexRecordWriter::new();
        let encoded = writer.encode(&record(None)).to_vec();
        let text = String::from_utf8(encoded).unwrap();

        assert_eq!(
            text,
            "0000000000001234 0000000000000005 000000000000002a0000000000000000 7fffffffffffffff\n"
        );
    }

    #[test]
    fn test_first_write_has_no_prev() {
        let mut writer = IndexRecordWriter::new();
        let encoded = writer.encode(&record(None)).to_vec();
        let decoded = IndexRecord::decode(&encoded, 0).unwrap();
        assert_eq!(decoded.prev_index_offset, None);
    }

    #[test]
    fn test_decode_sets_index_offset() {
        let mut writer = IndexRecordWriter::new();
        let encoded = writer.encode(&record(Some(7))).to_vec();
        let decoded = IndexRecord::decode(&encoded, 909).unwrap();
        assert_eq!(decoded.index_offset, 909);
        assert_eq!(decoded.prev_index_offset, Some(7));
    }

    #[test]
    fn test_decode_rejects_wrong_size() {
        let mut writer = IndexRecordWriter::new();
        let encoded = writer.encode(&record(None)).to_vec();

        let err = IndexRecord::decode(&encoded[..50], 0).unwrap_err();
        assert_eq!(err, DecodeError::WrongSize { expected: INDEX_RECORD_SIZE, actual: 50 });

        let mut longer = encoded.clone();
        longer.push(b'\n');
        assert!(IndexRecord::decode(&longer, 0).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_hex() {
        let mut writer = IndexRecordWriter::new();
        let mut encoded = writer.encode(&record(None)).to_vec();
        encoded[SIZE_POS + 3] = b'g';

        let err = IndexRecord::decode(&encoded, 0).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidHex { field: "data_size", .. }));
    }

    #[test]
    fn test_decode_rejects_missing_delimiter() {
        let mut writer = IndexRecordWriter::new();
        let mut encoded = writer.encode(&record(None)).to_vec();
        encoded[INDEX_RECORD_SIZE - 1] = b' ';

        let err = IndexRecord::decode(&encoded, 0).unwrap_err();
        assert_eq!(err, DecodeError::BadDelimiter { position: INDEX_RECORD_SIZE - 1 });
    }

    #[test]
    fn test_data_end_overflow() {
        let mut rec = record(None);
        assert_eq!(rec.data_end(), Some(0x1234 + 5));

        rec.data_size = u64::MAX;
        assert_eq!(rec.data_end(), None);
    }

    #[test]
    fn test_encoded_offsets_sort_numerically() {
        let mut writer = IndexRecordWriter::new();
        let mut small = record(None);
        small.data_offset = 0xff;
        let mut large = record(None);
        large.data_offset = 0x100;

        let a = writer.encode(&small).to_vec();
        let b = writer.encode(&large).to_vec();
        assert!(a[..16] < b[..16]);
    }

    proptest! {
        #[test]
        fn prop_round_trip(
            key in any::<[u8; KEY_SIZE]>(),
            data_offset in any::<u64>(),
            data_size in any::<u64>(),
            index_offset in any::<u64>(),
            prev in proptest::option::of(0..NO_PREV_INDEX),
        ) {
            let record = IndexRecord {
                key: Key::new(key),
                data_offset,
                data_size,
                index_offset,
                prev_index_offset: prev,
            };
            let mut writer = IndexRecordWriter::new();
            let encoded = writer.encode(&record).to_vec();
            prop_assert_eq!(encoded.len(), INDEX_RECORD_SIZE);
            prop_assert_eq!(IndexRecord::decode(&encoded, index_offset).unwrap(), record);
        }
    }
}
