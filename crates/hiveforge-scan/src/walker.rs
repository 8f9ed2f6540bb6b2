//! Depth-first directory walker that hashes every regular file.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use hiveforge_cdc::{FileChunker, PipelineError};
use hiveforge_core::{DirectoryEntry, FileRecord, HashConfig, HashError};

use crate::ignore::IgnoreRules;
use crate::progress::ProgressAggregator;

/// Why a walk stopped before visiting everything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Halt {
    /// The cancellation token fired.
    Cancelled,
    /// A whole-file hash ran out of time.
    FileTimeout { path: PathBuf, limit: Duration },
}

/// A directory subtree, possibly cut short.
#[derive(Debug)]
pub struct Walked {
    /// Everything hashed so far. Sizes are consistent even when halted.
    pub entry: DirectoryEntry,
    /// Set when the walk stopped early.
    pub halt: Option<Halt>,
}

/// Walks a directory tree and builds its [`DirectoryEntry`].
pub struct Walker<'a> {
    config: &'a HashConfig,
    chunker: FileChunker,
    progress: &'a ProgressAggregator,
    cancel: &'a CancellationToken,
}

impl<'a> Walker<'a> {
    /// Create a walker for one run.
    pub fn new(
        config: &'a HashConfig,
        chunker: FileChunker,
        progress: &'a ProgressAggregator,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            chunker,
            progress,
            cancel,
        }
    }

    /// Walk `root`, which must be a readable directory.
    ///
    /// Failing to list the root is the only error; everything below it is
    /// recorded as an ignored item instead.
    pub fn walk(&self, root: &Path) -> Result<Walked, HashError> {
        let rules = IgnoreRules::load(root, &IgnoreRules::empty(), &self.config.ignore_file_name);
        self.walk_dir(root, "", &rules)
    }

    fn walk_dir(
        &self,
        dir: &Path,
        rel: &str,
        rules: &Arc<IgnoreRules>,
    ) -> Result<Walked, HashError> {
        let mut entry = DirectoryEntry::new_directory(display_name(dir));
        tracing::debug!(dir = %dir.display(), "walking directory");

        let mut children = Vec::new();
        for child in fs::read_dir(dir).map_err(|e| HashError::io(dir, e))? {
            match child {
                Ok(c) => children.push(c),
                Err(err) => self
                    .progress
                    .record_ignored(dir, format!("Error reading directory entry: {err}")),
            }
        }
        // read_dir order is filesystem-defined; listing order is name order.
        children.sort_by_key(|c| c.file_name());

        for child in children {
            if self.cancel.is_cancelled() {
                return Ok(Walked {
                    entry,
                    halt: Some(Halt::Cancelled),
                });
            }

            let path = child.path();
            let name = child.file_name().to_string_lossy().into_owned();

            let metadata = match child.metadata() {
                Ok(m) => m,
                Err(err) => {
                    self.progress
                        .record_ignored(&path, format!("Error getting file info: {err}"));
                    continue;
                }
            };

            let child_rel = if rel.is_empty() {
                name.clone()
            } else {
                format!("{rel}/{name}")
            };

            if let Some(reason) = rules.should_ignore(&child_rel, metadata.is_dir()) {
                self.progress.record_ignored(&path, reason);
                continue;
            }

            if metadata.is_dir() {
                let child_rules =
                    IgnoreRules::load(&path, rules, &self.config.ignore_file_name);
                match self.walk_dir(&path, &child_rel, &child_rules) {
                    Ok(walked) => {
                        entry.push_child(walked.entry);
                        if walked.halt.is_some() {
                            return Ok(Walked {
                                entry,
                                halt: walked.halt,
                            });
                        }
                    }
                    Err(err) => self
                        .progress
                        .record_ignored(&path, format!("Error processing directory: {err}")),
                }
            } else if metadata.is_file() {
                self.progress.start_file(&child_rel);
                match self.hash_file(&path, &name, metadata.len()) {
                    Ok(record) => {
                        self.progress.finish_file(&child_rel, record.total_size());
                        entry.push_child(DirectoryEntry::new_file(record));
                    }
                    Err(PipelineError::Cancelled) => {
                        return Ok(Walked {
                            entry,
                            halt: Some(Halt::Cancelled),
                        });
                    }
                    Err(PipelineError::TimedOut { limit }) => {
                        tracing::warn!(file = %path.display(), "whole-file hash timed out");
                        return Ok(Walked {
                            entry,
                            halt: Some(Halt::FileTimeout { path, limit }),
                        });
                    }
                    Err(PipelineError::Io(err)) => self
                        .progress
                        .record_ignored(&path, format!("Error processing file: {err}")),
                }
            } else {
                self.progress.record_ignored(&path, "Skipped special file");
            }
        }

        Ok(Walked { entry, halt: None })
    }

    fn hash_file(&self, path: &Path, name: &str, size: u64) -> Result<FileRecord, PipelineError> {
        tracing::debug!(file = %path.display(), size, "hashing file");
        let file = File::open(path)?;
        let reader = io::BufReader::new(file);
        self.chunker.process(
            name,
            reader,
            size,
            self.config.file_timeout,
            || self.cancel.is_cancelled(),
        )
    }
}

fn display_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn walk(root: &Path) -> (Walked, ProgressAggregator) {
        let config = HashConfig::new(root);
        let progress = ProgressAggregator::new(5);
        let cancel = CancellationToken::new();
        let walked = Walker::new(&config, FileChunker::new(), &progress, &cancel)
            .walk(root)
            .unwrap();
        (walked, progress)
    }

    #[test]
    fn test_children_in_name_order() {
        let temp = TempDir::new().unwrap();
        for name in ["c.txt", "a.txt", "b.txt"] {
            fs::write(temp.path().join(name), name).unwrap();
        }

        let (walked, _) = walk(temp.path());
        let names: Vec<_> = walked.entry.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["a.txt", "b.txt", "c.txt"]);
        assert!(walked.halt.is_none());
    }

    #[test]
    fn test_directory_sizes_accumulate() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("a/b")).unwrap();
        fs::write(temp.path().join("top"), vec![1u8; 10]).unwrap();
        fs::write(temp.path().join("a/mid"), vec![2u8; 20]).unwrap();
        fs::write(temp.path().join("a/b/low"), vec![3u8; 30]).unwrap();

        let (walked, progress) = walk(temp.path());
        assert_eq!(walked.entry.size, 60);
        assert_eq!(walked.entry.child("a").unwrap().size, 50);
        assert!(walked.entry.sizes_consistent());
        assert_eq!(progress.snapshot().files_processed, 3);
    }

    #[test]
    fn test_cancelled_walk_returns_partial_tree() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a"), "a").unwrap();

        let config = HashConfig::new(temp.path());
        let progress = ProgressAggregator::new(5);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let walked = Walker::new(&config, FileChunker::new(), &progress, &cancel)
            .walk(temp.path())
            .unwrap();
        assert_eq!(walked.halt, Some(Halt::Cancelled));
        assert!(walked.entry.children.is_empty());
        assert_eq!(walked.entry.size, 0);
    }

    #[test]
    fn test_missing_root_is_error() {
        let temp = TempDir::new().unwrap();
        let config = HashConfig::new(temp.path());
        let progress = ProgressAggregator::new(5);
        let cancel = CancellationToken::new();

        let err = Walker::new(&config, FileChunker::new(), &progress, &cancel)
            .walk(&temp.path().join("missing"))
            .unwrap_err();
        assert!(matches!(err, HashError::NotFound { .. }));
    }
}
