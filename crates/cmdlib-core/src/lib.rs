//! cmdlib core library
//!
//! Persists a categorized library of shell-command snippets (command
//! text, category, free-text notes) across sessions. Two physical
//! storage formats sit behind one backend contract, selected at open
//! time from the filename suffix: a custom line-oriented flat-text
//! format (any suffix) and a single-file SQLite database (`.sqlite`).
//!
//! # Quick Start
//!
//! ```text
//! let mut store = RecordStore::new();
//! store.open_read("cmdlib.db")?;
//! store.load()?;
//! store.close()?;
//!
//! store.add("git", "git status", vec!["shows working tree status".into()]);
//!
//! store.open_write("cmdlib.db")?;
//! store.persist()?;
//! store.close()?;
//! ```
//!
//! # Modules
//!
//! - `store`: the record store driving one backend session (main entry point)
//! - `models`: the record data structure
//! - `storage`: backend contract plus the flat-text and SQLite backends
//! - `config`: flat key/value configuration persistence

pub mod config;
pub mod models;
pub mod storage;
pub mod store;

pub use config::{ConfigEntry, ConfigStore, SetOutcome};
pub use models::Record;
pub use storage::{OpenMode, StorageBackend, StorageError, StorageResult};
pub use store::RecordStore;
