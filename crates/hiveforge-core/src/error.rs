//! Error types for hashing runs.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::summary::HashRunSummary;

/// Errors that end a hashing run.
///
/// Entry-level and file-level failures never show up here; they are
/// recorded as ignored items and the walk continues.
#[derive(Debug, Error)]
pub enum HashError {
    /// Permission denied for a path.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// Path not found.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Generic I/O error.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Root path is not a directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The whole run exceeded its time budget.
    #[error("Hashing operation timed out after {}s", .limit.as_secs())]
    RunTimeout {
        limit: Duration,
        partial: Option<Box<HashRunSummary>>,
    },

    /// Whole-file hashing of a single file exceeded its time budget.
    #[error("Hashing file {path} timed out after {}s", .limit.as_secs())]
    FileTimeout {
        path: PathBuf,
        limit: Duration,
        partial: Option<Box<HashRunSummary>>,
    },

    /// Operation was cancelled.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl HashError {
    /// Create an I/O error with path context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }

    /// Check if this is one of the timeout errors.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RunTimeout { .. } | Self::FileTimeout { .. })
    }

    /// Results gathered before the run was abandoned, if any.
    pub fn partial(&self) -> Option<&HashRunSummary> {
        match self {
            Self::RunTimeout { partial, .. } | Self::FileTimeout { partial, .. } => {
                partial.as_deref()
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_error_io() {
        let err = HashError::io(
            "/test/path",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, HashError::PermissionDenied { .. }));

        let err = HashError::io("/x", std::io::Error::other("boom"));
        assert!(matches!(err, HashError::Io { .. }));
    }

    #[test]
    fn test_timeout_message() {
        let err = HashError::RunTimeout {
            limit: Duration::from_secs(1800),
            partial: None,
        };
        assert!(err.is_timeout());
        assert!(err.partial().is_none());
        assert_eq!(err.to_string(), "Hashing operation timed out after 1800s");
    }
}
