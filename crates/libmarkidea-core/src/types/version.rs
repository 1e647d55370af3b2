use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One live entry in a note's logical edit history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Commit id (full hex)
    pub version_ref: String,
    /// Commit author time
    pub timestamp: DateTime<Utc>,
}

impl VersionRecord {
    pub fn new(version_ref: impl Into<String>, unix_secs: i64) -> Self {
        Self {
            version_ref: version_ref.into(),
            timestamp: Utc
                .timestamp_opt(unix_secs, 0)
                .single()
                .unwrap_or_else(Utc::now),
        }
    }
}
