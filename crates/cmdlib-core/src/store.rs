//! The in-memory record set and the backend session driving it.
//!
//! `RecordStore` is the single entry point the application layer uses:
//! it selects a backend from the filename suffix, pulls or pushes the
//! whole record set through it, and answers category/command/notes
//! queries purely from memory.
//!
//! ## Usage
//!
//! ```ignore
//! let mut store = RecordStore::new();
//! store.open_read("cmdlib.db")?;
//! store.load()?;
//! store.close()?;
//!
//! for category in store.categories() {
//!     println!("{category}");
//! }
//! ```

use std::path::Path;

use tracing::debug;

use crate::models::{trim_trailing_empty, Record};
use crate::storage::{open_backend, OpenMode, StorageBackend, StorageError, StorageResult};

/// Owns the loaded records and at most one open backend session.
#[derive(Default)]
pub struct RecordStore {
    records: Vec<Record>,
    backend: Option<Box<dyn StorageBackend>>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open `path` for reading, selecting the backend from the suffix
    /// (`.sqlite` for SQLite, anything else for flat text).
    pub fn open_read(&mut self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.backend = Some(open_backend(path.as_ref(), OpenMode::Read)?);
        Ok(())
    }

    /// Open `path` for writing; same backend selection as `open_read`.
    pub fn open_write(&mut self, path: impl AsRef<Path>) -> StorageResult<()> {
        self.backend = Some(open_backend(path.as_ref(), OpenMode::Write)?);
        Ok(())
    }

    /// Replace the in-memory set with every record the open backend
    /// yields, in stream order.
    pub fn load(&mut self) -> StorageResult<()> {
        let backend = self.backend.as_mut().ok_or(StorageError::SessionClosed)?;
        self.records.clear();
        while let Some(record) = backend.read_record()? {
            self.records.push(record);
        }
        debug!("Loaded {} records", self.records.len());
        Ok(())
    }

    /// Sort the set (by command, then by category, byte order) and push
    /// it through the open backend. Stops on the first backend error;
    /// no partial retry.
    pub fn persist(&mut self) -> StorageResult<()> {
        let backend = self.backend.as_mut().ok_or(StorageError::SessionClosed)?;
        self.records
            .sort_by(|a, b| a.command.cmp(&b.command).then_with(|| a.category.cmp(&b.category)));
        for record in &self.records {
            backend.write_record(record)?;
        }
        debug!("Persisted {} records", self.records.len());
        Ok(())
    }

    /// Close the backend session and release the instance. The records
    /// stay in memory; a new session needs another `open_*` call.
    pub fn close(&mut self) -> StorageResult<()> {
        let mut backend = self.backend.take().ok_or(StorageError::SessionClosed)?;
        backend.close()
    }

    /// Drop every in-memory record, e.g. before switching to another
    /// database file.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Distinct categories, in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for record in &self.records {
            if !categories.contains(&record.category) {
                categories.push(record.category.clone());
            }
        }
        categories
    }

    /// Commands filed under `category`, in in-memory order.
    pub fn commands(&self, category: &str) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.category == category)
            .map(|r| r.command.clone())
            .collect()
    }

    /// Notes of the record matching (category, command), or an empty
    /// list if there is no match.
    pub fn notes(&self, category: &str, command: &str) -> Vec<String> {
        self.find(category, command)
            .map(|idx| self.records[idx].notes.clone())
            .unwrap_or_default()
    }

    /// Append a record. A trailing empty note is discarded. Duplicate
    /// (category, command) pairs are not rejected here; keeping the
    /// pair unique is the caller's responsibility.
    pub fn add(
        &mut self,
        category: impl Into<String>,
        command: impl Into<String>,
        notes: Vec<String>,
    ) {
        self.records.push(Record::new(category, command, notes));
    }

    /// Replace the command text and notes of the record matching
    /// (category, old_command); the category stays unchanged.
    pub fn modify(
        &mut self,
        category: &str,
        old_command: &str,
        new_command: impl Into<String>,
        notes: Vec<String>,
    ) -> StorageResult<()> {
        let idx = self
            .find(category, old_command)
            .ok_or_else(|| StorageError::RecordNotFound {
                category: category.to_string(),
                command: old_command.to_string(),
            })?;
        self.records[idx].command = new_command.into();
        self.records[idx].notes = trim_trailing_empty(notes);
        Ok(())
    }

    /// Remove the record matching (category, command).
    pub fn delete(&mut self, category: &str, command: &str) -> StorageResult<()> {
        let idx = self
            .find(category, command)
            .ok_or_else(|| StorageError::RecordNotFound {
                category: category.to_string(),
                command: command.to_string(),
            })?;
        self.records.remove(idx);
        Ok(())
    }

    /// Position of the record matching (category, command).
    pub fn find(&self, category: &str, command: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|r| r.category == category && r.command == command)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
