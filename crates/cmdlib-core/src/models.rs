//! Data model for the command library.

use serde::{Deserialize, Serialize};

/// One command-library entry: a shell command filed under a category,
/// with free-text notes.
///
/// The pair (category, command) is expected to be unique within one
/// loaded set; the store does not enforce this on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// The command text itself
    pub command: String,
    /// Category the command is filed under
    pub category: String,
    /// Notes shown with the command, one line each, in display order
    pub notes: Vec<String>,
}

impl Record {
    /// Create a record. A trailing empty note is discarded; edit
    /// surfaces tend to append one when the user leaves the notes
    /// field on a fresh line.
    pub fn new(
        category: impl Into<String>,
        command: impl Into<String>,
        notes: Vec<String>,
    ) -> Self {
        Self {
            command: command.into(),
            category: category.into(),
            notes: trim_trailing_empty(notes),
        }
    }
}

/// Drops a single empty note from the end of the list.
pub(crate) fn trim_trailing_empty(mut notes: Vec<String>) -> Vec<String> {
    if notes.last().is_some_and(|note| note.is_empty()) {
        notes.pop();
    }
    notes
}
