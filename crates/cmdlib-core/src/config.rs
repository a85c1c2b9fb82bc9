//! Flat key/value configuration persistence.
//!
//! The configuration file shares the framing family of the flat
//! command-library format: one fixed identifier line, then a plain
//! `key=value` body, one entry per line:
//!
//! ```text
//! ### CONFIGURATION COMMAND LIBRARY ###
//! database=/home/user/cmdlib.db
//! language=en
//! ```
//!
//! The value is the raw remainder of the line after the first `=`, so
//! values may contain `=` but never a newline. Entry order is kept and
//! written back unchanged.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::storage::error::{StorageError, StorageResult};

/// Identifier literal on the first line of every configuration file.
pub const CONFIG_IDENT: &str = "### CONFIGURATION COMMAND LIBRARY ###";

/// One key/value line of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// Outcome of [`ConfigStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// An existing key received a new value.
    Updated,
    /// The key was not present and has been appended.
    Inserted,
}

/// In-memory key/value configuration bound to one file.
pub struct ConfigStore {
    path: PathBuf,
    entries: Vec<ConfigEntry>,
}

impl ConfigStore {
    /// Create an empty store bound to `path`. Nothing is read until
    /// [`read`](Self::read) is called.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Vec::new(),
        }
    }

    /// Conventional per-user location of the configuration file
    /// (`~/.config/cmdlib/cmdlib.cfg` on Linux).
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("cmdlib")
            .join("cmdlib.cfg")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file, replacing the in-memory entries.
    ///
    /// The identifier line tolerates CRLF the same way the flat
    /// command-library format does. Blank lines are skipped; a line
    /// without `=` loads as a key with an empty value.
    pub fn read(&mut self) -> StorageResult<()> {
        let file = File::open(&self.path)
            .map_err(|e| StorageError::from_io(e, self.path.clone()))?;
        let mut reader = BufReader::new(file);

        let mut ident = String::new();
        reader
            .read_line(&mut ident)
            .map_err(|e| StorageError::from_io(e, self.path.clone()))?;

        let mut crlf = false;
        if ident.ends_with('\n') {
            ident.pop();
            if ident.ends_with('\r') {
                ident.pop();
                crlf = true;
            }
        }
        if ident != CONFIG_IDENT {
            return Err(StorageError::BadIdentifier {
                path: self.path.clone(),
            });
        }

        self.entries.clear();
        for line in reader.lines() {
            let mut line = line?;
            if crlf && line.ends_with('\r') {
                line.pop();
            }
            if line.is_empty() {
                continue;
            }
            let (key, value) = match line.split_once('=') {
                Some((key, value)) => (key.to_string(), value.to_string()),
                None => (line, String::new()),
            };
            self.entries.push(ConfigEntry { key, value });
        }

        debug!(
            "Read {} configuration entries from {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Rewrite the whole file from the in-memory entries.
    pub fn write(&self) -> StorageResult<()> {
        let file = File::create(&self.path)
            .map_err(|e| StorageError::from_io(e, self.path.clone()))?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "{CONFIG_IDENT}")?;
        for entry in &self.entries {
            writeln!(writer, "{}={}", entry.key, entry.value)?;
        }
        writer.flush()?;

        debug!(
            "Wrote {} configuration entries to {}",
            self.entries.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Value of `key`, or the empty string if the key is absent.
    pub fn get(&self, key: &str) -> &str {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_str())
            .unwrap_or("")
    }

    /// Set `key` to `value`, appending the key if it is new.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> SetOutcome {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|entry| entry.key == key) {
            Some(entry) => {
                entry.value = value;
                SetOutcome::Updated
            }
            None => {
                self.entries.push(ConfigEntry { key, value });
                SetOutcome::Inserted
            }
        }
    }

    /// Remove `key`; `true` if an entry was actually removed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.iter().position(|entry| entry.key == key) {
            Some(idx) => {
                self.entries.remove(idx);
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> &[ConfigEntry] {
        &self.entries
    }
}
