//! Run summary container.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::entry::DirectoryEntry;

/// An entry that was left out of the tree, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoredItem {
    /// Path of the skipped entry.
    pub path: PathBuf,
    /// Human-readable reason.
    pub reason: String,
}

impl IgnoredItem {
    /// Create a new ignored item.
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Complete result of one hashing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashRunSummary {
    /// Root path that was hashed.
    #[serde(rename = "root")]
    pub root_path: PathBuf,

    /// Root of the result tree.
    #[serde(rename = "dir")]
    pub directory_tree: DirectoryEntry,

    /// Total bytes of all hashed files.
    #[serde(rename = "size")]
    pub total_size: u64,

    /// Number of hashed files.
    #[serde(rename = "files")]
    pub total_files: u64,

    /// Wall-clock duration of the run in seconds.
    #[serde(rename = "time")]
    pub elapsed_seconds: f64,

    /// Everything that was skipped, in the order it was encountered.
    #[serde(rename = "ignoredItems")]
    pub ignored_items: Vec<IgnoredItem>,
}

impl HashRunSummary {
    /// Wrap a finished tree with its aggregate totals.
    pub fn assemble(
        root_path: PathBuf,
        directory_tree: DirectoryEntry,
        elapsed: Duration,
        ignored_items: Vec<IgnoredItem>,
    ) -> Self {
        Self {
            root_path,
            total_size: directory_tree.size,
            total_files: directory_tree.file_count(),
            directory_tree,
            elapsed_seconds: elapsed.as_secs_f64(),
            ignored_items,
        }
    }

    /// Check if anything was skipped.
    pub fn has_ignored(&self) -> bool {
        !self.ignored_items.is_empty()
    }
}
