use thiserror::Error;

/// Main error type for markidea operations
#[derive(Debug, Error)]
pub enum MarkideaError {
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("reset failed: {0}")]
    ResetFailed(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("database busy: {0}")]
    DbBusy(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MarkideaError {
    /// Get the error code for JSON output
    pub fn error_code(&self) -> &'static str {
        match self {
            MarkideaError::InvalidArgs(_) => "invalid_args",
            MarkideaError::NotFound(_) => "not_found",
            MarkideaError::AlreadyExists(_) => "already_exists",
            MarkideaError::ResetFailed(_) => "reset_failed",
            MarkideaError::Configuration(_) => "configuration",
            MarkideaError::DbBusy(_) => "db_busy",
            MarkideaError::Repository(_) => "repository_error",
            MarkideaError::Io(_) => "io_error",
            MarkideaError::Sled(_) => "db_error",
            MarkideaError::Json(_) => "internal_error",
            MarkideaError::TomlParse(_) => "invalid_args",
            MarkideaError::TomlSerialize(_) => "internal_error",
            MarkideaError::Internal(_) => "internal_error",
        }
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            MarkideaError::InvalidArgs(_) => 2,
            MarkideaError::NotFound(_) => 3,
            MarkideaError::AlreadyExists(_) => 4,
            MarkideaError::ResetFailed(_) => 4,
            MarkideaError::DbBusy(_) => 5,
            MarkideaError::Io(_) => 5,
            MarkideaError::Sled(_) => 5,
            MarkideaError::TomlParse(_) => 2,
            MarkideaError::Configuration(_) => 6,
            _ => 1,
        }
    }

    /// Whether the caller can recover from this error without operator action.
    ///
    /// Configuration errors are fatal at startup; everything else is reported
    /// back to the user as a structured failure.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, MarkideaError::Configuration(_))
    }

    /// Get actionable suggestions for fixing the error
    pub fn suggestions(&self) -> Vec<&'static str> {
        match self {
            MarkideaError::NotFound(msg) => {
                if msg.contains("notebook") {
                    vec!["Run 'markidea notebook list' to see available notebooks"]
                } else if msg.contains("deleted note") {
                    vec!["Run 'markidea trash list' to see recoverable notes"]
                } else if msg.contains("note") {
                    vec!["Run 'markidea note list <notebook>' to see available notes"]
                } else {
                    vec![]
                }
            }
            MarkideaError::DbBusy(_) => vec![
                "Another markidea process holds the database",
                "Wait for it to finish or stop markidea-daemon",
            ],
            MarkideaError::Sled(_) => vec![
                "Check disk space and permissions of the database directory",
            ],
            MarkideaError::Configuration(_) => vec![
                "Run 'markidea config init' to write a default configuration",
                "Check that notes_dir points to a writable directory",
            ],
            MarkideaError::ResetFailed(_) => vec![
                "Run 'markidea history list' to pick a valid version",
            ],
            _ => vec![],
        }
    }

    /// Create a NotFound error for a note
    pub fn note_not_found(notebook: &str, title: &str) -> Self {
        MarkideaError::NotFound(format!("note '{}/{}'", notebook, title))
    }

    /// Create a DbBusy error with process info
    pub fn database_locked(details: Option<&str>) -> Self {
        let msg = match details {
            Some(d) => format!("Database is locked ({})", d),
            None => "Database is locked by another process".to_string(),
        };
        MarkideaError::DbBusy(msg)
    }
}
