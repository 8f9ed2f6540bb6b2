//! Hashing progress reporting.
//!
//! The walker updates a shared [`ProgressAggregator`]; a separate render task
//! takes a [`ProgressSnapshot`] at a fixed interval and hands it to a
//! [`ProgressRender`] implementation.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use compact_str::CompactString;
use humansize::{DECIMAL, format_size};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hiveforge_core::{HashRunSummary, IgnoredItem};

use crate::prescan::PrescanTotals;

/// Number of recent files shown by [`ProgressSnapshot::render_lines`].
pub const RECENT_DISPLAYED: usize = 4;

/// Point-in-time copy of the aggregator state.
#[derive(Debug, Clone, Default)]
pub struct ProgressSnapshot {
    /// Files hashed so far.
    pub files_processed: u64,
    /// Bytes hashed so far.
    pub bytes_processed: u64,
    /// File currently being hashed.
    pub current_file: Option<CompactString>,
    /// Recently finished files, newest first.
    pub recent_files: Vec<CompactString>,
    /// Entries skipped so far.
    pub ignored_count: usize,
    /// Totals from the pre-scan, if one ran.
    pub expected: Option<PrescanTotals>,
    /// Whether the run has finished.
    pub completed: bool,
    /// Time since the aggregator was created.
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Percentage of expected files processed, if totals are known.
    pub fn percent_files(&self) -> Option<f64> {
        let expected = self.expected?.files;
        if expected == 0 {
            return None;
        }
        Some((self.files_processed as f64 / expected as f64 * 100.0).min(100.0))
    }

    /// Throughput in bytes per second.
    pub fn bytes_per_second(&self) -> f64 {
        if self.elapsed.as_secs_f64() > 0.0 {
            self.bytes_processed as f64 / self.elapsed.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Lines of the live progress display.
    pub fn render_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(3 + RECENT_DISPLAYED);

        let size = format_size(self.bytes_processed, DECIMAL);
        match self.expected {
            Some(totals) => lines.push(format!(
                "Files: {}/{} | Size: {} / {} | Time: {:.0}s",
                self.files_processed,
                totals.files,
                size,
                format_size(totals.bytes, DECIMAL),
                self.elapsed.as_secs_f64()
            )),
            None => lines.push(format!(
                "Files: {} | Size: {} | Time: {:.0}s",
                self.files_processed,
                size,
                self.elapsed.as_secs_f64()
            )),
        }

        lines.push(format!(
            "Current file: {}",
            self.current_file.as_deref().unwrap_or("-")
        ));
        lines.push("Recent files:".to_string());
        lines.extend(
            self.recent_files
                .iter()
                .take(RECENT_DISPLAYED)
                .map(|name| format!("  {name}")),
        );

        lines
    }
}

#[derive(Debug, Default)]
struct ProgressState {
    files_processed: u64,
    bytes_processed: u64,
    current_file: Option<CompactString>,
    recent: VecDeque<CompactString>,
    ignored: Vec<IgnoredItem>,
    expected: Option<PrescanTotals>,
    completed: bool,
}

/// Shared progress state for one hashing run.
#[derive(Debug)]
pub struct ProgressAggregator {
    state: Mutex<ProgressState>,
    recent_capacity: usize,
    start: Instant,
}

impl ProgressAggregator {
    /// Create an aggregator that remembers `recent_capacity` finished files.
    pub fn new(recent_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ProgressState::default()),
            recent_capacity,
            start: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the pre-scan totals.
    pub fn set_expected(&self, totals: PrescanTotals) {
        self.lock().expected = Some(totals);
    }

    /// Mark `name` as the file being hashed.
    pub fn start_file(&self, name: &str) {
        self.lock().current_file = Some(CompactString::new(name));
    }

    /// Count a finished file.
    pub fn finish_file(&self, name: &str, size: u64) {
        let mut state = self.lock();
        state.files_processed += 1;
        state.bytes_processed += size;
        state.current_file = None;
        if self.recent_capacity > 0 {
            if state.recent.len() == self.recent_capacity {
                state.recent.pop_back();
            }
            state.recent.push_front(CompactString::new(name));
        }
    }

    /// Append to the ignored-items log.
    pub fn record_ignored(&self, path: impl Into<PathBuf>, reason: impl Into<String>) {
        let item = IgnoredItem::new(path, reason);
        tracing::debug!(path = %item.path.display(), reason = %item.reason, "ignored");
        self.lock().ignored.push(item);
    }

    /// Mark the run as finished.
    pub fn complete(&self) {
        let mut state = self.lock();
        state.completed = true;
        state.current_file = None;
    }

    /// Copy of the ignored-items log.
    pub fn ignored_items(&self) -> Vec<IgnoredItem> {
        self.lock().ignored.clone()
    }

    /// Copy the current state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        let state = self.lock();
        ProgressSnapshot {
            files_processed: state.files_processed,
            bytes_processed: state.bytes_processed,
            current_file: state.current_file.clone(),
            recent_files: state.recent.iter().cloned().collect(),
            ignored_count: state.ignored.len(),
            expected: state.expected,
            completed: state.completed,
            elapsed: self.start.elapsed(),
        }
    }
}

impl Default for ProgressAggregator {
    fn default() -> Self {
        Self::new(5)
    }
}

/// Receives progress snapshots from the render task.
pub trait ProgressRender {
    /// Draw an intermediate snapshot.
    fn render(&mut self, snapshot: &ProgressSnapshot);

    /// Draw the final snapshot. Called exactly once.
    fn finish(&mut self, snapshot: &ProgressSnapshot);
}

/// Renderer that draws nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentRender;

impl ProgressRender for SilentRender {
    fn render(&mut self, _snapshot: &ProgressSnapshot) {}

    fn finish(&mut self, _snapshot: &ProgressSnapshot) {}
}

/// Spawn the render loop.
///
/// The loop ticks every `every` until `done` is cancelled, then renders the
/// final snapshot and hands the renderer back.
pub fn spawn_render_loop<R>(
    progress: Arc<ProgressAggregator>,
    mut renderer: R,
    every: Duration,
    done: CancellationToken,
) -> JoinHandle<R>
where
    R: ProgressRender + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = done.cancelled() => break,
                _ = ticker.tick() => renderer.render(&progress.snapshot()),
            }
        }

        renderer.finish(&progress.snapshot());
        renderer
    })
}

/// Human-readable end-of-run summary, including every ignored item.
pub fn summary_text(summary: &HashRunSummary) -> String {
    let mut out = String::new();
    out.push_str("Hashing completed!\n");
    out.push_str(&format!("Total files processed: {}\n", summary.total_files));
    out.push_str(&format!(
        "Total size: {}\n",
        format_size(summary.total_size, DECIMAL)
    ));
    out.push_str(&format!("Time taken: {:.0}s\n", summary.elapsed_seconds));

    if summary.has_ignored() {
        out.push_str("\nIgnored items:\n");
        for item in &summary.ignored_items {
            out.push_str(&format!(
                "   {}\n      Reason: {}\n",
                item.path.display(),
                item.reason
            ));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hiveforge_core::DirectoryEntry;

    #[test]
    fn test_recent_files_ring() {
        let progress = ProgressAggregator::new(5);
        for i in 0..7 {
            progress.start_file(&format!("f{i}"));
            progress.finish_file(&format!("f{i}"), 10);
        }

        let snap = progress.snapshot();
        assert_eq!(snap.files_processed, 7);
        assert_eq!(snap.bytes_processed, 70);
        let recent: Vec<&str> = snap.recent_files.iter().map(|s| s.as_str()).collect();
        assert_eq!(recent, ["f6", "f5", "f4", "f3", "f2"]);
        assert!(snap.current_file.is_none());

        let lines = snap.render_lines();
        let shown: Vec<_> = lines.iter().filter(|l| l.starts_with("  ")).collect();
        assert_eq!(shown.len(), RECENT_DISPLAYED);
        assert_eq!(shown[0], "  f6");
    }

    #[test]
    fn test_expected_totals_in_display() {
        let progress = ProgressAggregator::new(5);
        progress.set_expected(PrescanTotals { files: 4, bytes: 4000 });
        progress.finish_file("a", 1000);

        let snap = progress.snapshot();
        assert_eq!(snap.percent_files(), Some(25.0));
        assert!(snap.render_lines()[0].starts_with("Files: 1/4 | Size: "));
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let progress = Arc::new(ProgressAggregator::new(5));
        let clone = Arc::clone(&progress);
        let _ = std::thread::spawn(move || {
            let _guard = clone.state.lock().unwrap();
            panic!("poison");
        })
        .join();

        progress.finish_file("after", 1);
        assert_eq!(progress.snapshot().files_processed, 1);
    }

    #[test]
    fn test_summary_lists_ignored_items() {
        let summary = HashRunSummary::assemble(
            PathBuf::from("/data"),
            DirectoryEntry::new_directory("data"),
            Duration::from_secs(3),
            vec![IgnoredItem::new("/data/sock", "Skipped special file")],
        );
        let text = summary_text(&summary);
        assert!(text.contains("Total files processed: 0"));
        assert!(text.contains("   /data/sock\n      Reason: Skipped special file"));
    }

    #[tokio::test]
    async fn test_render_loop_finishes_once() {
        #[derive(Default)]
        struct Counting {
            renders: usize,
            finishes: usize,
            last_completed: bool,
        }
        impl ProgressRender for Counting {
            fn render(&mut self, _snapshot: &ProgressSnapshot) {
                self.renders += 1;
            }
            fn finish(&mut self, snapshot: &ProgressSnapshot) {
                self.finishes += 1;
                self.last_completed = snapshot.completed;
            }
        }

        let progress = Arc::new(ProgressAggregator::new(5));
        let done = CancellationToken::new();
        let handle = spawn_render_loop(
            Arc::clone(&progress),
            Counting::default(),
            Duration::from_millis(5),
            done.clone(),
        );

        tokio::time::sleep(Duration::from_millis(30)).await;
        progress.complete();
        done.cancel();

        let renderer = handle.await.unwrap();
        assert!(renderer.renders >= 1);
        assert_eq!(renderer.finishes, 1);
        assert!(renderer.last_completed);
    }
}
