//! Storage backends for the command library.
//!
//! Two physical formats implement one backend contract: a line-oriented
//! flat-text file and a SQLite database. The backend is selected once,
//! at open time, from the filename suffix; after that the record store
//! only talks to the [`StorageBackend`] trait.

pub mod error;
pub mod sqlite;
pub mod text;

pub use error::{StorageError, StorageResult};
pub use sqlite::SqliteBackend;
pub use text::TextBackend;

use std::path::Path;

use tracing::debug;

use crate::models::Record;

/// Direction of one open-to-close backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read records sequentially from an existing store.
    Read,
    /// Rewrite the store from scratch.
    Write,
}

/// Contract shared by both storage backends.
///
/// A backend instance is bound to a single open-to-close session. The
/// read side is a finite lazy sequence: `read_record` hands out one
/// record per call and `None` once the stream is exhausted; it can only
/// be restarted by reopening. Calling an operation against the opposite
/// session direction fails with [`StorageError::WrongMode`].
pub trait StorageBackend {
    /// Read the next record, `None` at the end of the stream.
    fn read_record(&mut self) -> StorageResult<Option<Record>>;

    /// Write one record.
    fn write_record(&mut self, record: &Record) -> StorageResult<()>;

    /// Finish the session, flushing buffers and backend bookkeeping.
    fn close(&mut self) -> StorageResult<()>;
}

/// Select and open the backend matching the filename suffix:
/// `.sqlite` means the SQLite backend, anything else (or no suffix at
/// all) the flat-text backend.
pub fn open_backend(path: &Path, mode: OpenMode) -> StorageResult<Box<dyn StorageBackend>> {
    if is_sqlite_suffix(path) {
        debug!("Opening {} with the SQLite backend", path.display());
        Ok(Box::new(SqliteBackend::open(path, mode)?))
    } else {
        debug!("Opening {} with the flat-text backend", path.display());
        Ok(Box::new(TextBackend::open(path, mode)?))
    }
}

/// Suffix comparison is case-insensitive and considers alphanumeric
/// characters only.
fn is_sqlite_suffix(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    let Some((_, suffix)) = name.rsplit_once('.') else {
        return false;
    };
    suffix
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .eq("sqlite".chars())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_suffix_matches() {
        assert!(is_sqlite_suffix(Path::new("cmdlib.sqlite")));
        assert!(is_sqlite_suffix(Path::new("/data/cmdlib.sqlite")));
    }

    #[test]
    fn test_sqlite_suffix_is_case_insensitive() {
        assert!(is_sqlite_suffix(Path::new("cmdlib.SQLite")));
        assert!(is_sqlite_suffix(Path::new("cmdlib.SQLITE")));
    }

    #[test]
    fn test_other_suffixes_select_text() {
        assert!(!is_sqlite_suffix(Path::new("cmdlib.db")));
        assert!(!is_sqlite_suffix(Path::new("cmdlib.txt")));
        assert!(!is_sqlite_suffix(Path::new("cmdlib")));
        assert!(!is_sqlite_suffix(Path::new("sqlite")));
    }

    #[test]
    fn test_suffix_after_last_dot_only() {
        assert!(is_sqlite_suffix(Path::new("backup.db.sqlite")));
        assert!(!is_sqlite_suffix(Path::new("backup.sqlite.db")));
    }
}
