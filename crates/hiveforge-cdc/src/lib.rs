//! Content-defined chunking for hiveforge.
//!
//! This crate splits file streams into variable-length, content-aligned
//! chunks (FastCDC-style) and hashes them with BLAKE3:
//!
//! - **Chunk-size policy** - min/max/normal bounds, rescaled for files of
//!   1 GiB and up so the chunk count stays bounded
//! - **Cut-point scanner** - a two-tier gear-hash boundary search
//! - **Pipeline** - drives the scanner over a stream, records 128-bit chunk
//!   digests, then computes the 256-bit whole-file digest on a second pass
//!
//! # Example
//!
//! ```rust,no_run
//! use std::fs::File;
//! use std::time::Duration;
//!
//! use hiveforge_cdc::FileChunker;
//!
//! let file = File::open("data.bin").unwrap();
//! let size = file.metadata().unwrap().len();
//! let record = FileChunker::new()
//!     .process("data.bin", file, size, Duration::from_secs(600), || false)
//!     .unwrap();
//!
//! println!("{} chunks, digest {}", record.chunks.len(), record.whole_file_hash());
//! ```

pub mod cut;
mod pipeline;
pub mod policy;

pub use cut::find_cut_point;
pub use pipeline::{ChunkList, FileChunker, PipelineError, chunk_hash, hash_whole};
pub use policy::{ABSOLUTE_MAX_CHUNKS, ChunkSizes};

// Re-export core types
pub use hiveforge_core::{Chunk, ChunkHash, ContentHash, FileRecord};
