use libmarkidea_core::MarkideaError;
use thiserror::Error;

/// Errors that can occur during repository operations
#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid repository layout: {0}")]
    InvalidLayout(String),

    #[error("Invalid version reference: {0}")]
    InvalidRef(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Version {0} is the current version, nothing to preview")]
    CurrentVersion(String),

    #[error("Content of {0} is not valid UTF-8")]
    InvalidContent(String),

    #[error("Sync error: {0}")]
    Sync(String),
}

impl From<GitError> for MarkideaError {
    fn from(err: GitError) -> Self {
        match err {
            GitError::InvalidLayout(msg) => MarkideaError::Configuration(msg),
            GitError::InvalidRef(msg) => MarkideaError::InvalidArgs(format!("invalid version: {}", msg)),
            GitError::NotFound(msg) => MarkideaError::NotFound(msg),
            err @ GitError::CurrentVersion(_) => MarkideaError::NotFound(err.to_string()),
            GitError::Io(e) => MarkideaError::Io(e),
            other => MarkideaError::Repository(other.to_string()),
        }
    }
}
