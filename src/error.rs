//! Error types for codesniff operations.
//!
//! One enum per subsystem:
//! - Settings resolution and validation
//! - Tool acquisition (download, extraction, install)
//! - Subprocess execution

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while resolving settings, before any real work starts.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Please provide path to installed PHP CodeSniffer or path to download PHP CodeSniffer")]
    MissingToolLocation,

    #[error("Please define which version of PHP CodeSniffer you want to download")]
    MissingVersion,

    #[error("Please provide the PHP interpreter path")]
    MissingInterpreter,

    #[error("Please provide path to code")]
    MissingSourcePath,

    #[error("Invalid value for '{option}': {reason}")]
    InvalidValue { option: String, reason: String },

    #[error("Failed to read settings file '{path}': {reason}")]
    SettingsFile { path: PathBuf, reason: String },
}

/// Errors that can occur while acquiring the tool.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("Tool version must be a non-empty name without path separators")]
    InvalidVersion,

    #[error("Provided version of PHP CodeSniffer is wrong or check your internet connection. details: {0}")]
    DownloadFailed(String),
}

impl AcquireError {
    /// Wraps any displayable cause as a download failure.
    pub fn download(cause: impl std::fmt::Display) -> Self {
        AcquireError::DownloadFailed(cause.to_string())
    }
}

/// Errors that can occur while running the tool as a child process.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Process was terminated before reporting an exit code")]
    Terminated,

    #[error("Process exited with unexpected code {code}")]
    UnexpectedExit { code: i32 },

    #[error("Process timed out after {0:?}")]
    Timeout(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the combined acquire-then-run flow.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error("Error while executing the sniff checks: {0}")]
    Execution(#[from] ExecutionError),
}
