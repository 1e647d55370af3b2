//! Structured change descriptors carried in commit messages
//!
//! Every commit made by markidea stores a JSON object as its message:
//! `{"changeType":0,"fileName":"diary/a.md","prevRef":"..."}`. The integer
//! wire values are stable and must not be reordered.

use serde::{Deserialize, Serialize};

/// Kind of change a commit records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    NewOrModify,
    New,
    Modify,
    Move,
    Copy,
    Recover,
    Reset,
    Delete,
}

impl ChangeType {
    pub const ALL: [ChangeType; 8] = [
        ChangeType::NewOrModify,
        ChangeType::New,
        ChangeType::Modify,
        ChangeType::Move,
        ChangeType::Copy,
        ChangeType::Recover,
        ChangeType::Reset,
        ChangeType::Delete,
    ];

    pub fn as_i32(self) -> i32 {
        match self {
            ChangeType::NewOrModify => 0,
            ChangeType::New => 1,
            ChangeType::Modify => 2,
            ChangeType::Move => 3,
            ChangeType::Copy => 4,
            ChangeType::Recover => 5,
            ChangeType::Reset => 6,
            ChangeType::Delete => 7,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        ChangeType::ALL.into_iter().find(|ct| ct.as_i32() == value)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::NewOrModify => "new_or_modify",
            ChangeType::New => "new",
            ChangeType::Modify => "modify",
            ChangeType::Move => "move",
            ChangeType::Copy => "copy",
            ChangeType::Recover => "recover",
            ChangeType::Reset => "reset",
            ChangeType::Delete => "delete",
        }
    }
}

/// Decoded commit descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDescriptor {
    pub change_type: ChangeType,
    pub file_name: String,
    pub old_file_name: Option<String>,
    pub new_file_name: Option<String>,
    /// Target version of a RESET
    pub prev_ref: Option<String>,
}

impl ChangeDescriptor {
    pub fn new(change_type: ChangeType, file_name: impl Into<String>) -> Self {
        Self {
            change_type,
            file_name: file_name.into(),
            old_file_name: None,
            new_file_name: None,
            prev_ref: None,
        }
    }

    pub fn with_prev_ref(mut self, prev_ref: impl Into<String>) -> Self {
        self.prev_ref = Some(prev_ref.into());
        self
    }

    pub fn with_rename(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.old_file_name = Some(old.into());
        self.new_file_name = Some(new.into());
        self
    }

    /// Whether the descriptor is about `path`, directly or through a
    /// directory containing it
    pub fn names(&self, path: &str) -> bool {
        self.file_name == path
            || path
                .strip_prefix(self.file_name.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Whether this commit changed the content of `path`.
    ///
    /// A MOVE only counts for the destination it names, or for files under
    /// it when a whole notebook was moved.
    pub fn changes_content_of(&self, path: &str) -> bool {
        match self.change_type {
            ChangeType::NewOrModify | ChangeType::New | ChangeType::Modify | ChangeType::Reset => {
                true
            }
            ChangeType::Move => self.names(path),
            ChangeType::Copy | ChangeType::Recover | ChangeType::Delete => false,
        }
    }

    /// Encode into a commit message
    pub fn encode(&self) -> String {
        let wire = WireMessage {
            change_type: Some(self.change_type.as_i32()),
            file_name: Some(self.file_name.clone()),
            old_file_name: self.old_file_name.clone(),
            new_file_name: self.new_file_name.clone(),
            prev_ref: self.prev_ref.clone(),
        };
        // Serializing a struct of strings and integers cannot fail
        serde_json::to_string(&wire).unwrap_or_default()
    }

    /// Decode a commit message.
    ///
    /// Returns `None` for messages not written by markidea (foreign commits,
    /// unknown change types, missing fields).
    pub fn decode(message: &str) -> Option<Self> {
        let wire: WireMessage = serde_json::from_str(message.trim()).ok()?;
        let change_type = ChangeType::from_i32(wire.change_type?)?;
        Some(Self {
            change_type,
            file_name: wire.file_name?,
            old_file_name: wire.old_file_name,
            new_file_name: wire.new_file_name,
            prev_ref: wire.prev_ref,
        })
    }
}

/// Convenience for the common case
pub fn encode(change_type: ChangeType, file_name: &str) -> String {
    ChangeDescriptor::new(change_type, file_name).encode()
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMessage {
    #[serde(default)]
    change_type: Option<i32>,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    old_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prev_ref: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_every_change_type() {
        for ct in ChangeType::ALL {
            let desc = ChangeDescriptor::new(ct, "diary/a.md");
            assert_eq!(ChangeDescriptor::decode(&desc.encode()), Some(desc));
        }
    }

    #[test]
    fn test_wire_format() {
        let msg = ChangeDescriptor::new(ChangeType::Reset, "diary/a.md")
            .with_prev_ref("abc123")
            .encode();
        let value: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(value["changeType"], 6);
        assert_eq!(value["fileName"], "diary/a.md");
        assert_eq!(value["prevRef"], "abc123");
        assert!(value.get("oldFileName").is_none());
    }

    #[test]
    fn test_decode_foreign_messages() {
        assert_eq!(ChangeDescriptor::decode("Initial commit"), None);
        assert_eq!(ChangeDescriptor::decode("{\"fileName\":\"a.md\"}"), None);
        assert_eq!(ChangeDescriptor::decode("{\"changeType\":42,\"fileName\":\"a.md\"}"), None);
        assert_eq!(ChangeDescriptor::decode("{\"changeType\":0}"), None);
    }

    #[test]
    fn test_decode_accepts_unknown_fields_and_whitespace() {
        let msg = "{\"changeType\":3,\"fileName\":\"b/x.md\",\"extra\":true}\n";
        let desc = ChangeDescriptor::decode(msg).unwrap();
        assert_eq!(desc.change_type, ChangeType::Move);
        assert_eq!(desc.file_name, "b/x.md");
    }

    #[test]
    fn test_move_counts_only_for_destination() {
        let desc = ChangeDescriptor::new(ChangeType::Move, "b/x.md").with_rename("a/x.md", "b/x.md");
        assert!(desc.changes_content_of("b/x.md"));
        assert!(!desc.changes_content_of("a/x.md"));
        assert!(!ChangeDescriptor::new(ChangeType::Delete, "a/x.md").changes_content_of("a/x.md"));
    }

    #[test]
    fn test_names_path_or_containing_directory() {
        let desc = ChangeDescriptor::new(ChangeType::Reset, "diary/a.md");
        assert!(desc.names("diary/a.md"));
        assert!(!desc.names("diary/a.md.bak"));

        let dir = ChangeDescriptor::new(ChangeType::Delete, "diary");
        assert!(dir.names("diary/a.md"));
        assert!(!dir.names("diary2/a.md"));
    }

    #[test]
    fn test_notebook_move_counts_for_contained_notes() {
        let desc = ChangeDescriptor::new(ChangeType::Move, "journal").with_rename("diary", "journal");
        assert!(desc.changes_content_of("journal/x.md"));
        assert!(!desc.changes_content_of("journalism/x.md"));
        assert!(!desc.changes_content_of("diary/x.md"));
    }
}
