//! In-memory record store loaded from a fixed-record message database.
//!
//! The database file is a headerless sequence of fixed-width binary
//! records: a 16-byte name buffer followed by a 24-byte message buffer,
//! both NUL-padded. Records are loaded sequentially to end-of-file and
//! kept in file order.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk width of the name field in bytes.
pub const NAME_WIDTH: usize = 16;

/// On-disk width of the message field in bytes.
pub const MESSAGE_WIDTH: usize = 24;

/// Total on-disk width of one record.
pub const RECORD_WIDTH: usize = NAME_WIDTH + MESSAGE_WIDTH;

/// A single database record.
///
/// Fields are kept as the raw fixed-width buffers from disk; the logical
/// value of each field is the bytes before the first NUL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    name: [u8; NAME_WIDTH],
    message: [u8; MESSAGE_WIDTH],
}

impl Record {
    /// Decode one record from a raw 40-byte slice.
    fn decode(raw: &[u8]) -> Record {
        let mut name = [0u8; NAME_WIDTH];
        let mut message = [0u8; MESSAGE_WIDTH];
        name.copy_from_slice(&raw[..NAME_WIDTH]);
        message.copy_from_slice(&raw[NAME_WIDTH..RECORD_WIDTH]);
        Record { name, message }
    }

    /// The name field value (bytes before the first NUL).
    pub fn name(&self) -> &[u8] {
        trim_at_nul(&self.name)
    }

    /// The message field value (bytes before the first NUL).
    pub fn message(&self) -> &[u8] {
        trim_at_nul(&self.message)
    }
}

/// Truncate a fixed-width field buffer at its first NUL byte.
fn trim_at_nul(buf: &[u8]) -> &[u8] {
    match buf.iter().position(|&b| b == 0) {
        Some(pos) => &buf[..pos],
        None => buf,
    }
}

/// Read-only, ordered collection of records for one session.
///
/// Constructed by [`RecordStore::load`] at session start, exclusively
/// owned by that session, and dropped as a unit when the session ends.
pub struct RecordStore {
    records: Vec<Record>,
}

impl RecordStore {
    /// Load a record store from the database file at `path`.
    ///
    /// Any failure here is fatal to the whole process by contract: the
    /// caller propagates the error to the top-level exit path rather
    /// than ending just the current session.
    pub fn load(path: &Path) -> Result<RecordStore, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::Open(path.to_path_buf(), e))?;
        let store = Self::from_reader(file)?;
        debug!(
            path = %path.display(),
            records = store.len(),
            "Database loaded"
        );
        Ok(store)
    }

    /// Decode a strict sequence of fixed-width records until end-of-file.
    pub(crate) fn from_reader<R: Read>(mut reader: R) -> Result<RecordStore, LoadError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw).map_err(LoadError::Read)?;

        if raw.len() % RECORD_WIDTH != 0 {
            return Err(LoadError::TruncatedRecord {
                file_size: raw.len(),
            });
        }

        let records = raw.chunks_exact(RECORD_WIDTH).map(Record::decode).collect();
        Ok(RecordStore { records })
    }

    /// Number of records in the store.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate over records in file/load order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }
}

/// Database load errors. All of these are whole-process fatal.
#[derive(Debug)]
pub enum LoadError {
    /// The database file could not be opened.
    Open(PathBuf, io::Error),
    /// An I/O error occurred while reading the database.
    Read(io::Error),
    /// The file size is not a multiple of the record width.
    TruncatedRecord { file_size: usize },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Open(path, e) => {
                write!(f, "Failed to open database file '{}': {}", path.display(), e)
            }
            LoadError::Read(e) => write!(f, "Failed to read database file: {e}"),
            LoadError::TruncatedRecord { file_size } => write!(
                f,
                "Database size {file_size} is not a multiple of the {RECORD_WIDTH}-byte record width"
            ),
        }
    }
}

impl std::error::Error for LoadError {}
