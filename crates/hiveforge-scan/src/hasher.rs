//! Async driver for a complete hashing run.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use hiveforge_cdc::FileChunker;
use hiveforge_core::{HashConfig, HashError, HashRunSummary};

use crate::prescan::prescan;
use crate::progress::{ProgressAggregator, ProgressRender, spawn_render_loop};
use crate::walker::{Halt, Walked, Walker};

/// How long a cancelled walk may take to hand back its partial tree.
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Hashes a directory tree into a [`HashRunSummary`].
pub struct DirectoryHasher {
    config: HashConfig,
    chunker: FileChunker,
    progress: Arc<ProgressAggregator>,
    cancel: CancellationToken,
}

impl DirectoryHasher {
    /// Create a hasher for `config`.
    pub fn new(config: HashConfig) -> Self {
        let progress = Arc::new(ProgressAggregator::new(config.recent_files));
        Self {
            config,
            chunker: FileChunker::new(),
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Use a custom chunker.
    pub fn with_chunker(mut self, chunker: FileChunker) -> Self {
        self.chunker = chunker;
        self
    }

    /// Shared progress state.
    pub fn progress(&self) -> Arc<ProgressAggregator> {
        Arc::clone(&self.progress)
    }

    /// Token that stops the run when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run configuration.
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    /// Hash the configured root, rendering progress with `renderer`.
    ///
    /// A root that cannot be resolved or is not a directory fails
    /// immediately. Timeouts return the partial summary inside the error.
    pub async fn run<R>(&self, renderer: R) -> Result<HashRunSummary, HashError>
    where
        R: ProgressRender + Send + 'static,
    {
        let start = Instant::now();
        let root = self
            .config
            .root
            .canonicalize()
            .map_err(|e| HashError::io(&self.config.root, e))?;
        let metadata = std::fs::metadata(&root).map_err(|e| HashError::io(&root, e))?;
        if !metadata.is_dir() {
            return Err(HashError::NotADirectory { path: root });
        }

        tracing::info!(root = %root.display(), "starting hash run");

        // One budget covers the prescan and the walk.
        let deadline = start + self.config.run_timeout;
        if self.config.prescan {
            self.prescan(&root, deadline).await?;
        }

        let done = CancellationToken::new();
        let render = spawn_render_loop(
            Arc::clone(&self.progress),
            renderer,
            self.config.render_interval,
            done.clone(),
        );

        let result = self.walk(root, start, deadline).await;

        self.progress.complete();
        done.cancel();
        if let Err(err) = render.await {
            tracing::warn!(error = %err, "progress render task failed");
        }

        match &result {
            Ok(summary) => tracing::info!(
                files = summary.total_files,
                bytes = summary.total_size,
                ignored = summary.ignored_items.len(),
                "hash run finished"
            ),
            Err(err) => tracing::warn!(error = %err, "hash run stopped"),
        }
        result
    }

    /// Count files for the progress totals, giving up when the run budget
    /// is spent.
    async fn prescan(&self, root: &Path, deadline: Instant) -> Result<(), HashError> {
        let limit = self.config.run_timeout;
        let budget = deadline.saturating_duration_since(Instant::now());
        if budget.is_zero() {
            return Err(HashError::RunTimeout {
                limit,
                partial: None,
            });
        }

        let cancel = self.cancel.child_token();
        let task = {
            let root = root.to_path_buf();
            let cancel = cancel.clone();
            tokio::task::spawn_blocking(move || prescan(&root, &cancel))
        };

        match tokio::time::timeout(budget, task).await {
            Ok(Ok(totals)) => self.progress.set_expected(totals),
            Ok(Err(err)) => tracing::warn!(error = %err, "prescan task failed"),
            Err(_) => {
                tracing::warn!(limit_secs = limit.as_secs(), "run timed out during prescan");
                cancel.cancel();
                return Err(HashError::RunTimeout {
                    limit,
                    partial: None,
                });
            }
        }
        Ok(())
    }

    async fn walk(
        &self,
        root: PathBuf,
        start: Instant,
        deadline: Instant,
    ) -> Result<HashRunSummary, HashError> {
        let run_cancel = self.cancel.child_token();
        let limit = self.config.run_timeout;
        let budget = deadline.saturating_duration_since(Instant::now());

        let mut task = {
            let config = self.config.clone();
            let chunker = self.chunker;
            let progress = Arc::clone(&self.progress);
            let cancel = run_cancel.clone();
            let root = root.clone();
            tokio::task::spawn_blocking(move || {
                Walker::new(&config, chunker, &progress, &cancel).walk(&root)
            })
        };

        let (joined, timed_out) = match tokio::time::timeout(budget, &mut task).await {
            Ok(joined) => (Some(joined), false),
            Err(_) => {
                tracing::warn!(limit_secs = limit.as_secs(), "run timed out, stopping walk");
                run_cancel.cancel();
                match tokio::time::timeout(CANCEL_GRACE, task).await {
                    Ok(joined) => (Some(joined), true),
                    Err(_) => (None, true),
                }
            }
        };

        let Some(joined) = joined else {
            return Err(HashError::RunTimeout {
                limit,
                partial: None,
            });
        };

        let walked = flatten(joined)?;
        let summary = HashRunSummary::assemble(
            root,
            walked.entry,
            start.elapsed(),
            self.progress.ignored_items(),
        );

        match walked.halt {
            None => Ok(summary),
            Some(Halt::Cancelled) if timed_out => Err(HashError::RunTimeout {
                limit,
                partial: Some(Box::new(summary)),
            }),
            Some(Halt::Cancelled) => Err(HashError::Cancelled),
            Some(Halt::FileTimeout { path, limit }) => Err(HashError::FileTimeout {
                path,
                limit,
                partial: Some(Box::new(summary)),
            }),
        }
    }
}

fn flatten(joined: Result<Result<Walked, HashError>, JoinError>) -> Result<Walked, HashError> {
    joined.map_err(|e| HashError::Other {
        message: format!("walk task failed: {e}"),
    })?
}
