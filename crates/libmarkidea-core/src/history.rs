//! Logical edit history of a note
//!
//! The raw commit log of a path contains every commit that touched it:
//! saves, moves, deletes, recoveries and rollbacks. `reconstruct` turns that
//! log into the list of versions a user can still pick from.
//!
//! Rollback elision: a RESET to version `X` supersedes every commit between
//! `X` and the RESET, and `X` itself (the RESET now carries that content).
//! Walking newest to oldest, a live RESET therefore elides all older commits
//! down to and including its target. A RESET inside an elided range is
//! elided too and its own range is ignored. A RESET whose target is not in
//! the log elides nothing.

use std::collections::HashMap;

use crate::types::change::{ChangeDescriptor, ChangeType};
use crate::types::version::VersionRecord;

/// One entry of a path-filtered commit log, newest first
#[derive(Debug, Clone)]
pub struct LoggedCommit {
    pub id: String,
    pub unix_secs: i64,
    pub message: String,
}

impl LoggedCommit {
    pub fn new(id: impl Into<String>, unix_secs: i64, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            unix_secs,
            message: message.into(),
        }
    }
}

/// Derive the live version list for `path` from its commit log (newest first)
pub fn reconstruct(path: &str, log: &[LoggedCommit]) -> Vec<VersionRecord> {
    let position: HashMap<&str, usize> = log
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id.as_str(), i))
        .collect();

    let mut records = Vec::new();
    let mut skip_until: Option<usize> = None;

    for (i, commit) in log.iter().enumerate() {
        if let Some(target) = skip_until {
            if i >= target {
                skip_until = None;
            }
            continue;
        }

        // Foreign or malformed messages are noise
        let Some(desc) = ChangeDescriptor::decode(&commit.message) else {
            continue;
        };

        if desc.change_type == ChangeType::Reset {
            if let Some(&target) = desc.prev_ref.as_deref().and_then(|r| position.get(r)) {
                if target > i {
                    skip_until = Some(target);
                }
            }
        }

        if desc.changes_content_of(path) {
            records.push(VersionRecord::new(&commit.id, commit.unix_secs));
        }
    }

    records
}
