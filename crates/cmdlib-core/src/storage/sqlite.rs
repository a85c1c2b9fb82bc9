//! SQLite storage backend.
//!
//! Records live in a single `commands` table. Notes are packed into a
//! blob: each note's UTF-8 bytes followed by one zero byte, in order.
//!
//! The format has no destructive "replace all" primitive. A write
//! session against a pre-existing table instead tracks the row id of
//! every record it writes and, on close, deletes the rows whose id was
//! never written. A session that fails midway leaves the untouched
//! rows intact.

use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use tracing::{debug, info};

use super::error::{StorageError, StorageResult};
use super::{OpenMode, StorageBackend};
use crate::models::Record;

const SCHEMA: &str = "CREATE TABLE commands (
    id INTEGER PRIMARY KEY,
    command VARCHAR(255),
    category VARCHAR(64),
    notes BLOB
)";

/// Backend for the single-file relational format.
pub struct SqliteBackend {
    path: PathBuf,
    conn: Connection,
    mode: OpenMode,
    /// Rows materialized by the first `read_record` call, handed out
    /// one at a time.
    pending: Option<VecDeque<Record>>,
    /// Row ids confirmed during this write session.
    written_ids: HashSet<i64>,
    /// Delete rows absent from `written_ids` on close.
    reconcile: bool,
}

impl SqliteBackend {
    /// Open `path` for one read or write session.
    ///
    /// Reading requires an existing SQLite file that exposes at least
    /// one table. Writing creates the schema when none is present; a
    /// pre-existing `commands` table marks the session for close-time
    /// reconciliation instead of truncating it.
    pub fn open(path: &Path, mode: OpenMode) -> StorageResult<Self> {
        let exists = path.exists();
        if mode == OpenMode::Read && !exists {
            return Err(StorageError::FileNotFound {
                path: path.to_path_buf(),
            });
        }

        let mut backend = Self {
            path: path.to_path_buf(),
            conn: Connection::open(path)?,
            mode,
            pending: None,
            written_ids: HashSet::new(),
            reconcile: false,
        };

        match mode {
            OpenMode::Read => {
                if backend.table_count()? == 0 {
                    return Err(backend.bad_format("no tables"));
                }
            }
            OpenMode::Write if exists => {
                if backend.table_count()? == 0 {
                    return Err(backend.bad_format("no tables"));
                }
                if backend.has_commands_table()? {
                    backend.reconcile = true;
                    debug!(
                        "{} has a commands table, reconciling on close",
                        path.display()
                    );
                } else {
                    backend.conn.execute(SCHEMA, [])?;
                }
            }
            OpenMode::Write => {
                backend.conn.execute(SCHEMA, [])?;
                debug!("Created command table in {}", path.display());
            }
        }

        Ok(backend)
    }

    /// Total number of tables, distinguishing "empty database" from
    /// "not a database at all".
    fn table_count(&self) -> StorageResult<i64> {
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::NotADatabase => {
                    self.bad_format("not a SQLite database")
                }
                other => StorageError::Database(other),
            })
    }

    fn has_commands_table(&self) -> StorageResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'commands'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn bad_format(&self, details: impl Into<String>) -> StorageError {
        StorageError::BadFormat {
            path: self.path.clone(),
            details: details.into(),
        }
    }

    fn row_id(&self, command: &str) -> StorageResult<Option<i64>> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM commands WHERE command = ?1",
                params![command],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl StorageBackend for SqliteBackend {
    fn read_record(&mut self) -> StorageResult<Option<Record>> {
        if self.mode != OpenMode::Read {
            return Err(StorageError::WrongMode { needed: "reading" });
        }

        if self.pending.is_none() {
            let mut stmt = self
                .conn
                .prepare("SELECT command, category, notes FROM commands")?;
            let rows = stmt.query_map([], |row| {
                let blob: Option<Vec<u8>> = row.get(2)?;
                Ok(Record {
                    command: row.get(0)?,
                    category: row.get(1)?,
                    notes: decode_notes(&blob.unwrap_or_default()),
                })
            })?;
            let records = rows.collect::<Result<VecDeque<_>, _>>()?;
            debug!("Read {} rows from {}", records.len(), self.path.display());
            self.pending = Some(records);
        }

        Ok(self.pending.as_mut().and_then(VecDeque::pop_front))
    }

    fn write_record(&mut self, record: &Record) -> StorageResult<()> {
        if self.mode != OpenMode::Write {
            return Err(StorageError::WrongMode { needed: "writing" });
        }

        // A row with the same command text counts as already written;
        // its category and notes are left as they are.
        if self.row_id(&record.command)?.is_none() {
            self.conn.execute(
                "INSERT INTO commands (command, category, notes) VALUES (?1, ?2, ?3)",
                params![
                    record.command,
                    record.category,
                    encode_notes(&record.notes)
                ],
            )?;
        }

        match self.row_id(&record.command)? {
            Some(id) => {
                self.written_ids.insert(id);
                Ok(())
            }
            None => Err(self.bad_format(format!(
                "row for '{}' vanished after write",
                record.command
            ))),
        }
    }

    fn close(&mut self) -> StorageResult<()> {
        if self.reconcile {
            let mut stmt = self.conn.prepare("SELECT id FROM commands")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, i64>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            drop(stmt);

            let mut removed = 0;
            for id in ids {
                if !self.written_ids.contains(&id) {
                    self.conn
                        .execute("DELETE FROM commands WHERE id = ?1", params![id])?;
                    removed += 1;
                }
            }
            if removed > 0 {
                info!(
                    "Reconciliation removed {} stale rows from {}",
                    removed,
                    self.path.display()
                );
            }
            self.reconcile = false;
        }
        self.written_ids.clear();
        self.pending = None;
        Ok(())
    }
}

/// Pack notes into the blob encoding: UTF-8 bytes of each note, each
/// followed by a single zero byte.
fn encode_notes(notes: &[String]) -> Vec<u8> {
    let mut blob = Vec::new();
    for note in notes {
        blob.extend_from_slice(note.as_bytes());
        blob.push(0);
    }
    blob
}

/// Unpack a notes blob. Trailing bytes not terminated by a zero byte
/// are dropped.
fn decode_notes(blob: &[u8]) -> Vec<String> {
    let mut notes = Vec::new();
    let mut start = 0;
    for (idx, byte) in blob.iter().enumerate() {
        if *byte == 0 {
            notes.push(String::from_utf8_lossy(&blob[start..idx]).into_owned());
            start = idx + 1;
        }
    }
    notes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_all(backend: &mut SqliteBackend, records: &[Record]) {
        for rec in records {
            backend.write_record(rec).unwrap();
        }
    }

    fn read_all(backend: &mut SqliteBackend) -> Vec<Record> {
        let mut records = Vec::new();
        while let Some(rec) = backend.read_record().unwrap() {
            records.push(rec);
        }
        records
    }

    fn sample(category: &str, command: &str, notes: &[&str]) -> Record {
        Record::new(
            category,
            command,
            notes.iter().map(|n| n.to_string()).collect(),
        )
    }

    #[test]
    fn test_notes_blob_encoding() {
        let notes = vec!["first".to_string(), "second".to_string()];
        let blob = encode_notes(&notes);
        assert_eq!(blob, b"first\0second\0");
        assert_eq!(decode_notes(&blob), notes);
    }

    #[test]
    fn test_empty_notes_blob() {
        assert!(encode_notes(&[]).is_empty());
        assert!(decode_notes(&[]).is_empty());
    }

    #[test]
    fn test_decode_drops_unterminated_tail() {
        assert_eq!(decode_notes(b"one\0garbage"), vec!["one".to_string()]);
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        let records = vec![
            sample("git", "git status", &["shows working tree status"]),
            sample("fs", "df -h", &[]),
        ];

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        write_all(&mut backend, &records);
        backend.close().unwrap();

        let mut backend = SqliteBackend::open(&path, OpenMode::Read).unwrap();
        let loaded = read_all(&mut backend);
        backend.close().unwrap();

        assert_eq!(loaded, records);
    }

    #[test]
    fn test_open_read_missing_file() {
        let dir = TempDir::new().unwrap();
        let result = SqliteBackend::open(&dir.path().join("absent.sqlite"), OpenMode::Read);
        assert!(matches!(result, Err(StorageError::FileNotFound { .. })));
    }

    #[test]
    fn test_open_read_non_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.sqlite");
        fs::write(&path, "definitely not a database").unwrap();

        let result = SqliteBackend::open(&path, OpenMode::Read);
        assert!(matches!(result, Err(StorageError::BadFormat { .. })));
    }

    #[test]
    fn test_open_write_non_database_leaves_file_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("junk.sqlite");
        fs::write(&path, "definitely not a database").unwrap();

        let result = SqliteBackend::open(&path, OpenMode::Write);
        assert!(matches!(result, Err(StorageError::BadFormat { .. })));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "definitely not a database"
        );
    }

    #[test]
    fn test_open_read_empty_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.sqlite");
        // valid SQLite file with zero tables
        Connection::open(&path).unwrap();

        let result = SqliteBackend::open(&path, OpenMode::Read);
        assert!(matches!(result, Err(StorageError::BadFormat { .. })));
    }

    #[test]
    fn test_open_write_adds_schema_to_foreign_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("other.sqlite");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE other (x INTEGER)", []).unwrap();
        }

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        backend
            .write_record(&sample("git", "git status", &[]))
            .unwrap();
        backend.close().unwrap();

        let conn = Connection::open(&path).unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM commands", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn test_duplicate_command_is_a_no_op() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        backend
            .write_record(&sample("old", "git status", &["old note"]))
            .unwrap();
        backend.close().unwrap();

        // same command text, different category and notes
        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        backend
            .write_record(&sample("new", "git status", &["new note"]))
            .unwrap();
        backend.close().unwrap();

        let mut backend = SqliteBackend::open(&path, OpenMode::Read).unwrap();
        let loaded = read_all(&mut backend);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].category, "old");
        assert_eq!(loaded[0].notes, vec!["old note"]);
    }

    #[test]
    fn test_reconciliation_removes_unwritten_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        let a = sample("cat", "a", &["note a"]);
        let b = sample("cat", "b", &["note b"]);
        let c = sample("cat", "c", &["note c"]);

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        write_all(&mut backend, &[a.clone(), b, c.clone()]);
        backend.close().unwrap();

        // rewrite only a and c; b must disappear on close
        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        write_all(&mut backend, &[a.clone(), c.clone()]);
        backend.close().unwrap();

        let mut backend = SqliteBackend::open(&path, OpenMode::Read).unwrap();
        let loaded = read_all(&mut backend);
        assert_eq!(loaded, vec![a, c]);
    }

    #[test]
    fn test_fresh_database_does_not_reconcile() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        assert!(!backend.reconcile);
        backend.write_record(&sample("cat", "a", &[])).unwrap();
        backend.close().unwrap();
    }

    #[test]
    fn test_read_on_write_session_is_wrong_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        let mut backend = SqliteBackend::open(&path, OpenMode::Write).unwrap();
        assert!(matches!(
            backend.read_record(),
            Err(StorageError::WrongMode { .. })
        ));
    }

    #[test]
    fn test_write_on_read_session_is_wrong_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cmdlib.sqlite");

        SqliteBackend::open(&path, OpenMode::Write)
            .unwrap()
            .close()
            .unwrap();

        let mut backend = SqliteBackend::open(&path, OpenMode::Read).unwrap();
        assert!(matches!(
            backend.write_record(&sample("a", "b", &[])),
            Err(StorageError::WrongMode { .. })
        ));
    }
}
