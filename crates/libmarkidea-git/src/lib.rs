//! Git-backed note repositories for markidea
//!
//! This crate wraps one git repository per user:
//! - One commit per mutating file operation, tagged with a change descriptor
//! - Per-file history with rollback elision
//! - Historical content through path-scoped tree diffs
//! - Rollback and recovery of single paths
//! - SSH push and fast-forward pull against a single remote

mod error;
mod repo;
mod sync;

pub use error::GitError;
pub use repo::{NoteRepository, DEFAULT_BRANCH};
pub use sync::{PullResult, PushResult, DEFAULT_REMOTE};
