//! Daemon-specific error types

use thiserror::Error;

/// Errors specific to daemon operations
#[derive(Error, Debug)]
pub enum DaemonError {
    /// Invalid or missing configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Core markidea error
    #[error("Markidea error: {0}")]
    Markidea(#[from] libmarkidea_core::MarkideaError),

    /// Background task panicked or was cancelled
    #[error("Task error: {0}")]
    Task(String),
}

impl DaemonError {
    /// Process exit code for startup failures
    pub fn exit_code(&self) -> i32 {
        match self {
            DaemonError::Config(_) => 6,
            DaemonError::Markidea(e) => e.exit_code(),
            _ => 1,
        }
    }
}
