use serde::{Deserialize, Serialize};

use crate::error::MarkideaError;

/// File extension of a note inside a notebook directory
pub const NOTE_EXTENSION: &str = "md";

/// Empty marker file that distinguishes a notebook from an arbitrary directory
pub const NOTEBOOK_FLAG_FILE: &str = ".notebook";

/// Marker file committed at the repository root when a user repository is created
pub const REPO_FLAG_FILE: &str = ".markidea";

/// Identity of a single note: `(username, notebook, title)`.
///
/// This is also the cache key for content and preview lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteKey {
    pub username: String,
    pub notebook: String,
    pub title: String,
}

impl NoteKey {
    pub fn new(
        username: impl Into<String>,
        notebook: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            notebook: notebook.into(),
            title: title.into(),
        }
    }

    /// Path of the note relative to the user's repository root
    pub fn relative_path(&self) -> String {
        note_path(&self.notebook, &self.title)
    }

    /// Reject names that would escape the notebook directory
    pub fn validate(&self) -> Result<(), MarkideaError> {
        validate_name("username", &self.username)?;
        validate_name("notebook", &self.notebook)?;
        validate_name("title", &self.title)
    }
}

/// `notebook/title.md`
pub fn note_path(notebook: &str, title: &str) -> String {
    format!("{}/{}.{}", notebook, title, NOTE_EXTENSION)
}

/// `notebook/.notebook`
pub fn notebook_flag_path(notebook: &str) -> String {
    format!("{}/{}", notebook, NOTEBOOK_FLAG_FILE)
}

/// Extract the note title from a file name if it carries the markdown extension.
///
/// The extension match is case-insensitive (`.md`, `.MD`, `.Md`).
pub fn title_from_file_name(file_name: &str) -> Option<&str> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if stem.is_empty() || !ext.eq_ignore_ascii_case(NOTE_EXTENSION) {
        return None;
    }
    Some(stem)
}

/// Validate a single path component used as username, notebook or title
pub fn validate_name(kind: &str, name: &str) -> Result<(), MarkideaError> {
    if name.trim().is_empty() {
        return Err(MarkideaError::InvalidArgs(format!("{} must not be blank", kind)));
    }
    if name.starts_with('.') {
        return Err(MarkideaError::InvalidArgs(format!(
            "{} '{}' must not start with '.'",
            kind, name
        )));
    }
    if name.contains(['/', '\\', '\0']) {
        return Err(MarkideaError::InvalidArgs(format!(
            "{} '{}' contains a path separator",
            kind, name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let key = NoteKey::new("alice", "diary", "2024-01-01");
        assert_eq!(key.relative_path(), "diary/2024-01-01.md");
        assert_eq!(notebook_flag_path("diary"), "diary/.notebook");
    }

    #[test]
    fn test_title_from_file_name() {
        assert_eq!(title_from_file_name("hello.md"), Some("hello"));
        assert_eq!(title_from_file_name("hello.MD"), Some("hello"));
        assert_eq!(title_from_file_name("v1.2.Md"), Some("v1.2"));
        assert_eq!(title_from_file_name(".notebook"), None);
        assert_eq!(title_from_file_name("image.png"), None);
        assert_eq!(title_from_file_name("README"), None);
    }

    #[test]
    fn test_validate_rejects_traversal() {
        assert!(validate_name("notebook", "..").is_err());
        assert!(validate_name("notebook", "a/b").is_err());
        assert!(validate_name("notebook", "  ").is_err());
        assert!(validate_name("notebook", ".hidden").is_err());
        assert!(validate_name("notebook", "work notes").is_ok());
        assert!(NoteKey::new("bob", "x", "y\\z").validate().is_err());
    }
}
