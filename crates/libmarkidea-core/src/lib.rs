//! Core library for markidea
//!
//! - Note identity and on-disk layout
//! - Commit change descriptors (the structured commit message format)
//! - History reconstruction with rollback elision
//! - Service configuration
//! - sled-backed recycle bin and sync settings

pub mod config;
pub mod error;
pub mod history;
pub mod store;
pub mod types;

pub use error::MarkideaError;
pub use history::{reconstruct, LoggedCommit};
pub use store::{LockedStore, MarkideaStore};
pub use types::change::{ChangeDescriptor, ChangeType};
pub use types::deleted::DeletedNoteSnapshot;
pub use types::note::NoteKey;
pub use types::sync::{SyncConfig, SyncReport, SyncStatus};
pub use types::version::VersionRecord;
