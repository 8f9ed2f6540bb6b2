//! Directory hashing engine for hiveforge.
//!
//! This crate walks a directory tree, applies `.hiveignore` rules, runs every
//! regular file through the chunking pipeline and assembles the result tree.
//!
//! # Overview
//!
//! - **Ignore rules** inherited per directory, matched with `globset`
//! - **Depth-first walk** on a blocking thread, children in name order
//! - **Progress** shared through an aggregator and drawn by a render task
//! - **Timeouts** for the whole run and for each file, with partial results
//!
//! # Example
//!
//! ```rust,no_run
//! use hiveforge_scan::{DirectoryHasher, HashConfig, SilentRender};
//!
//! # async fn run() -> Result<(), hiveforge_scan::HashError> {
//! let hasher = DirectoryHasher::new(HashConfig::new("/path/to/data"));
//! let summary = hasher.run(SilentRender).await?;
//!
//! println!("Total size: {} bytes", summary.total_size);
//! println!("Total files: {}", summary.total_files);
//! # Ok(())
//! # }
//! ```
//!
//! # Progress Rendering
//!
//! Implement [`ProgressRender`] to draw snapshots:
//!
//! ```rust
//! use hiveforge_scan::{ProgressRender, ProgressSnapshot};
//!
//! struct Log;
//!
//! impl ProgressRender for Log {
//!     fn render(&mut self, snapshot: &ProgressSnapshot) {
//!         eprintln!("{} files", snapshot.files_processed);
//!     }
//!
//!     fn finish(&mut self, snapshot: &ProgressSnapshot) {
//!         eprintln!("done: {} files", snapshot.files_processed);
//!     }
//! }
//! ```

mod hasher;
mod ignore;
mod prescan;
mod progress;
mod walker;

pub use hasher::DirectoryHasher;
pub use ignore::IgnoreRules;
pub use prescan::{PrescanTotals, prescan};
pub use progress::{
    ProgressAggregator, ProgressRender, ProgressSnapshot, RECENT_DISPLAYED, SilentRender,
    spawn_render_loop, summary_text,
};
pub use walker::{Halt, Walked, Walker};

// Re-export core types for convenience
pub use hiveforge_core::{
    DirectoryEntry, EntryKind, FileRecord, HashConfig, HashError, HashRunSummary, IgnoredItem,
};
