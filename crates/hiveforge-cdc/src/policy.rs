//! Chunk-size bounds derived from the file size.

/// Default minimum chunk size (4 KiB, sector aligned).
pub const MIN_CHUNK_SIZE: usize = 4 * 1024;

/// Default maximum chunk size (128 KiB).
pub const MAX_CHUNK_SIZE: usize = 128 * 1024;

/// Default target chunk size (16 KiB).
pub const NORMAL_CHUNK_SIZE: usize = 16 * 1024;

/// Files at or above this size get rescaled bounds.
pub const LARGE_FILE_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// Hard limit on the number of chunks produced for one file.
pub const ABSOLUTE_MAX_CHUNKS: usize = 1_000_000;

/// Min/max/normal bounds handed to the cut-point scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkSizes {
    /// Windows at or below this length are emitted whole.
    pub min: usize,
    /// Longest chunk the scanner will produce.
    pub max: usize,
    /// Target size; the scanner switches masks here.
    pub normal: usize,
}

impl Default for ChunkSizes {
    fn default() -> Self {
        Self {
            min: MIN_CHUNK_SIZE,
            max: MAX_CHUNK_SIZE,
            normal: NORMAL_CHUNK_SIZE,
        }
    }
}

impl ChunkSizes {
    /// Bounds for a file of `file_size` bytes.
    ///
    /// Below [`LARGE_FILE_THRESHOLD`] the defaults apply. Larger files are
    /// scaled so that the expected chunk count stays under
    /// [`ABSOLUTE_MAX_CHUNKS`].
    pub fn for_file_size(file_size: u64) -> Self {
        if file_size < LARGE_FILE_THRESHOLD {
            return Self::default();
        }

        let average = file_size.div_ceil(ABSOLUTE_MAX_CHUNKS as u64) as usize;
        Self {
            min: MIN_CHUNK_SIZE.max(average / 2),
            max: MAX_CHUNK_SIZE.max(average * 2),
            normal: average,
        }
    }
}
