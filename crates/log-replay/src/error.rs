//! Error types for replay sessions.

use std::path::PathBuf;

use thiserror::Error;

/// Failures that end (or prevent) a replay session.
///
/// Per-line anomalies such as a missing or unparsable timestamp are never
/// reported through this type; they are recovered inside the session.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Invalid filter pattern '{pattern}': {source}")]
    InvalidFilterPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Invalid timestamp pattern '{pattern}': {source}")]
    InvalidTimestampPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Timestamp pattern '{pattern}' must have exactly one capture group, found {groups}")]
    CaptureGroupCount { pattern: String, groups: usize },

    #[error("Invalid timestamp format '{format}'")]
    InvalidTimestampFormat { format: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ReplayError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error was raised while validating the configuration.
    pub fn is_config(&self) -> bool {
        !matches!(self, Self::Io { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReplayError>;
