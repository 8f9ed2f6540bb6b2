//! Core types and traits for hiveforge.
//!
//! This crate provides the fundamental data structures shared by the
//! chunking engine, the directory walker and the submission client:
//! chunk and file records, the directory tree, the run summary, the error
//! taxonomy and run configuration.

mod config;
mod entry;
mod error;
mod summary;

pub use config::{HashConfig, HashConfigBuilder};
pub use entry::{
    CHUNK_ALGORITHM, Chunk, ChunkHash, ChunkingInfo, ContentHash, DirectoryEntry, EntryKind,
    FileInfo, FileRecord, ParseDigestError,
};
pub use error::HashError;
pub use summary::{HashRunSummary, IgnoredItem};
