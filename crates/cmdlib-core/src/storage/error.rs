//! Error types for the storage layer.
//!
//! Every failure is returned as a value; record lookups that miss are
//! a normal outcome (`RecordNotFound`), not an I/O fault.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the record store, the storage backends and the
/// configuration store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The file does not exist.
    #[error("file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// The first line of a flat file did not match the expected
    /// identifier literal.
    #[error("'{path}' does not carry a valid identifier line")]
    BadIdentifier { path: PathBuf },

    /// The file exists but is not a valid store for the selected
    /// backend.
    #[error("'{path}' is not a valid store: {details}")]
    BadFormat { path: PathBuf, details: String },

    /// The flat format frames the note count in three decimal digits;
    /// records with more than 999 notes cannot be represented.
    #[error("record '{command}' has {count} notes, the flat format stores at most 999")]
    NoteOverflow { command: String, count: usize },

    /// No record matches the requested (category, command) pair.
    #[error("no record for command '{command}' in category '{category}'")]
    RecordNotFound { category: String, command: String },

    /// The operation does not match the direction the session was
    /// opened in.
    #[error("session was not opened for {needed}")]
    WrongMode { needed: &'static str },

    /// A store operation ran without an open backend session.
    #[error("no open storage session")]
    SessionClosed,

    /// Underlying SQLite failure.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Underlying file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl StorageError {
    /// Classify an I/O error, mapping a missing file to `FileNotFound`
    /// with path context.
    pub(crate) fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => StorageError::FileNotFound { path },
            _ => StorageError::Io(error),
        }
    }
}
