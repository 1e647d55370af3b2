use serde::{Deserialize, Serialize};

use super::note::{note_path, NoteKey};

/// Content of a deleted note, kept outside the repository for recovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedNoteSnapshot {
    pub id: u64,
    pub username: String,
    pub notebook: String,
    pub title: String,
    pub content: String,
    /// Newest live version of the note before deletion, if it was ever committed
    pub last_ref: Option<String>,
    pub deleted_at_ms: u64,
}

impl DeletedNoteSnapshot {
    pub fn key(&self) -> NoteKey {
        NoteKey::new(&self.username, &self.notebook, &self.title)
    }

    pub fn relative_path(&self) -> String {
        note_path(&self.notebook, &self.title)
    }
}
