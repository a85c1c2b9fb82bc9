//! Flat-text storage backend.
//!
//! File layout: one fixed identifier line, then one framing line per
//! record followed by that record's note lines:
//!
//! ```text
//! ### DATABASE COMMAND LIBRARY ###
//! git:002:git status
//! shows working tree status
//! never modifies the tree
//! ```
//!
//! The framing line is `<category>:<note count>:<command>` with the
//! note count zero-padded to three digits. The category cannot contain
//! `:`; the command can. An empty line (or the end of the file) ends
//! the record stream.
//!
//! The reader accepts identifier lines ending in LF or CRLF and applies
//! the detected convention to the rest of the session; the writer
//! always emits bare LF.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::{StorageError, StorageResult};
use super::{OpenMode, StorageBackend};
use crate::models::Record;

/// Identifier literal on the first line of every command-library file.
pub const FILE_IDENT: &str = "### DATABASE COMMAND LIBRARY ###";

/// Most notes one record can carry; the framing line stores the count
/// in three decimal digits.
pub const MAX_NOTES: usize = 999;

enum Stream {
    Reader(BufReader<File>),
    Writer(BufWriter<File>),
}

/// Backend for the custom line-oriented flat format.
pub struct TextBackend {
    path: PathBuf,
    stream: Stream,
    /// Lines of this file end in CRLF, detected from the identifier.
    crlf: bool,
    /// An empty line or EOF ended the record stream.
    exhausted: bool,
}

impl TextBackend {
    /// Open `path` for one read or write session.
    ///
    /// Reading validates the identifier line and remembers the line
    /// ending convention; writing truncates the file and emits a fresh
    /// identifier line.
    pub fn open(path: &Path, mode: OpenMode) -> StorageResult<Self> {
        match mode {
            OpenMode::Read => Self::open_read(path),
            OpenMode::Write => Self::open_write(path),
        }
    }

    fn open_read(path: &Path) -> StorageResult<Self> {
        let file = File::open(path)
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;
        let mut reader = BufReader::new(file);

        let mut ident = String::new();
        reader
            .read_line(&mut ident)
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;

        let mut crlf = false;
        if ident.ends_with('\n') {
            ident.pop();
            if ident.ends_with('\r') {
                ident.pop();
                crlf = true;
                debug!("{} uses CRLF line endings", path.display());
            }
        }
        if ident != FILE_IDENT {
            return Err(StorageError::BadIdentifier {
                path: path.to_path_buf(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            stream: Stream::Reader(reader),
            crlf,
            exhausted: false,
        })
    }

    fn open_write(path: &Path) -> StorageResult<Self> {
        let file = File::create(path)
            .map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{FILE_IDENT}")?;

        Ok(Self {
            path: path.to_path_buf(),
            stream: Stream::Writer(writer),
            crlf: false,
            exhausted: false,
        })
    }

    /// Next physical line with the line ending stripped; `None` at EOF.
    fn next_line(&mut self) -> StorageResult<Option<String>> {
        let Stream::Reader(reader) = &mut self.stream else {
            return Err(StorageError::WrongMode { needed: "reading" });
        };
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if line.ends_with('\n') {
            line.pop();
            if self.crlf && line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(Some(line))
    }

    fn bad_format(&self, details: impl Into<String>) -> StorageError {
        StorageError::BadFormat {
            path: self.path.clone(),
            details: details.into(),
        }
    }

    /// Split a framing line into (category, note count, command).
    fn parse_frame(&self, line: &str) -> StorageResult<(String, usize, String)> {
        let Some((category, rest)) = line.split_once(':') else {
            return Err(self.bad_format("record line without category separator"));
        };
        let Some((digits, command)) = rest.split_once(':') else {
            return Err(self.bad_format("record line without note count separator"));
        };
        if digits.len() != 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.bad_format(format!("note count '{digits}' is not three digits")));
        }
        let count = digits
            .bytes()
            .fold(0usize, |acc, b| acc * 10 + usize::from(b - b'0'));
        Ok((category.to_string(), count, command.to_string()))
    }
}

impl StorageBackend for TextBackend {
    fn read_record(&mut self) -> StorageResult<Option<Record>> {
        if self.exhausted {
            return Ok(None);
        }

        let frame = match self.next_line()? {
            None => {
                self.exhausted = true;
                return Ok(None);
            }
            Some(line) if line.is_empty() => {
                self.exhausted = true;
                return Ok(None);
            }
            Some(line) => line,
        };

        let (category, count, command) = self.parse_frame(&frame)?;

        let mut notes = Vec::with_capacity(count);
        for _ in 0..count {
            match self.next_line()? {
                Some(note) => notes.push(note),
                None => {
                    return Err(self.bad_format(format!(
                        "end of file inside the notes of '{command}'"
                    )))
                }
            }
        }

        Ok(Some(Record {
            command,
            category,
            notes,
        }))
    }

    fn write_record(&mut self, record: &Record) -> StorageResult<()> {
        if record.notes.len() > MAX_NOTES {
            return Err(StorageError::NoteOverflow {
                command: record.command.clone(),
                count: record.notes.len(),
            });
        }
        let Stream::Writer(writer) = &mut self.stream else {
            return Err(StorageError::WrongMode { needed: "writing" });
        };
        writeln!(
            writer,
            "{}:{:03}:{}",
            record.category,
            record.notes.len(),
            record.command
        )?;
        for note in &record.notes {
            writeln!(writer, "{note}")?;
        }
        Ok(())
    }

    fn close(&mut self) -> StorageResult<()> {
        if let Stream::Writer(writer) = &mut self.stream {
            writer.flush()?;
        }
        debug!("Closed flat-text session on {}", self.path.display());
        Ok(())
    }
}
