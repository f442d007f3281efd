//! Error types for CLI operations.

use std::path::PathBuf;

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {}", .path.display())]
    ConfigNotFound { path: PathBuf },

    /// Malformed line in an events file
    #[error("Invalid event at {}:{line}: {message}", .path.display())]
    EventsFile {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// Some notification batches failed permanently
    #[error("{failed} of {batches} batches failed")]
    BatchesFailed { failed: u64, batches: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub fn config_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn events_file(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::EventsFile {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
