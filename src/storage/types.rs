//! core type-safe wrappers for keys, table identifiers and the record separator.

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Size of a [`Key`] in bytes.
pub const KEY_SIZE: usize = 16;

/// Size of a [`RecordSeparator`] in bytes.
pub const RECORD_SEPARATOR_SIZE: usize = 32;

/// The key of an entry in a table.
///
/// Keys are fixed-size opaque byte arrays, so anything that fits in 16 bytes
/// (raw UUIDs, hashes truncated to 128 bits) can be used directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Key([u8; KEY_SIZE]);

impl Key {
    /// create a key from its raw bytes
    pub const fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// create a key whose leading bytes hold `n` in big-endian order
    pub fn from_u64(n: u64) -> Self {
        let mut bytes = [0u8; KEY_SIZE];
        bytes[..8].copy_from_slice(&n.to_be_bytes());
        Self(bytes)
    }

    /// parse a key from its 32-char hex form
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut bytes = [0u8; KEY_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }

    /// raw bytes of the key
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// lowercase hex form, as written into the data log trailer
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; KEY_SIZE]> for Key {
    fn from(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Key {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A validated table identifier.
///
/// Table keys double as file name stems (`<key>.data`, `<key>.index`), so
/// they are restricted to characters that are safe on every filesystem.
///
/// Valid keys:
/// - 1-64 characters
/// - ASCII alphanumerics, underscores and hyphens only
///
/// Keys order byte-wise; that order is the lock acquisition order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableKey(String);

impl TableKey {
    /// maximum length of a table key
    pub const MAX_LEN: usize = 64;

    /// create a new TableKey, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > Self::MAX_LEN {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// validate a list of names
    pub fn parse_all<I, S>(names: I) -> Result<Vec<Self>, InvalidNameError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        names.into_iter().map(|name| Self::new(name.as_ref())).collect()
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// file name of the table's data log
    pub fn data_file_name(&self) -> String {
        format!("{}.data", self.0)
    }

    /// file name of the table's index log
    pub fn index_file_name(&self) -> String {
        format!("{}.index", self.0)
    }
}

impl fmt::Display for TableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for TableKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TableKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl FromStr for TableKey {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TableKey {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TableKey> for String {
    fn from(key: TableKey) -> Self {
        key.0
    }
}

/// Marker written after every payload in a data log.
///
/// The separator exists only so that an operator looking at a hex dump can
/// find record boundaries; nothing in the engine parses it. The first byte is
/// always a line feed, the remaining 31 bytes are configurable.
///
/// To make manual recovery practical the configured bytes SHOULD be random,
/// SHOULD stay the same across restarts and SHOULD be kept secret so that
/// stored payloads are unlikely to contain them.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecordSeparator([u8; RECORD_SEPARATOR_SIZE]);

impl RecordSeparator {
    /// hex form of the default separator
    pub const DEFAULT_HEX: &'static str =
        "ce6dcbb021ea09d2c6e77714d7cdefcdf28fe1e0b4221e24d78648efe10ed8";

    const DEFAULT_BYTES: [u8; RECORD_SEPARATOR_SIZE] = [
        b'\n', 0xce, 0x6d, 0xcb, 0xb0, 0x21, 0xea, 0x09, 0xd2, 0xc6, 0xe7, 0x77, 0x14, 0xd7, 0xcd,
        0xef, 0xcd, 0xf2, 0x8f, 0xe1, 0xe0, 0xb4, 0x22, 0x1e, 0x24, 0xd7, 0x86, 0x48, 0xef, 0xe1,
        0x0e, 0xd8,
    ];

    /// length of the hex form accepted by [`RecordSeparator::from_hex`]
    pub const HEX_LEN: usize = (RECORD_SEPARATOR_SIZE - 1) * 2;

    /// build a separator from 62 hex chars (31 bytes); byte 0 is always `\n`
    pub fn from_hex(s: &str) -> Result<Self, InvalidSeparatorError> {
        if s.len() != Self::HEX_LEN {
            return Err(InvalidSeparatorError::WrongLength(s.len()));
        }

        let mut bytes = [0u8; RECORD_SEPARATOR_SIZE];
        hex::decode_to_slice(s, &mut bytes[1..])
            .map_err(|e| InvalidSeparatorError::InvalidHex(e.to_string()))?;
        bytes[0] = b'\n';
        Ok(Self(bytes))
    }

    /// the configurable part of the separator, hex-encoded
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0[1..])
    }

    /// the full separator as written to disk
    pub fn as_bytes(&self) -> &[u8; RECORD_SEPARATOR_SIZE] {
        &self.0
    }
}

impl Default for RecordSeparator {
    fn default() -> Self {
        Self(Self::DEFAULT_BYTES)
    }
}

// the separator is treated as a secret, keep it out of debug output
impl fmt::Debug for RecordSeparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordSeparator(..)")
    }
}

impl Serialize for RecordSeparator {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for RecordSeparator {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// error type for invalid table keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
        }
    }
}

impl std::error::Error for InvalidNameError {}

/// error type for an unusable record separator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidSeparatorError {
    WrongLength(usize),
    InvalidHex(String),
}

impl fmt::Display for InvalidSeparatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongLength(len) => write!(
                f,
                "separator must be {} hex chars, got {}",
                RecordSeparator::HEX_LEN,
                len
            ),
            Self::InvalidHex(reason) => write!(f, "separator is not valid hex: {}", reason),
        }
    }
}

impl std::error::Error for InvalidSeparatorError {}
