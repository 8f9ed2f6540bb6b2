//! Streaming chunk-and-hash pipeline for a single file.
//!
//! A file is read twice: the first pass cuts it into content-defined chunks
//! and hashes each one, the second pass (after rewinding) computes the
//! whole-file digest under a time budget.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use blake3::Hasher;
use thiserror::Error;

use hiveforge_core::{Chunk, ChunkHash, ContentHash, FileRecord};

use crate::cut::find_cut_point;
use crate::policy::{ABSOLUTE_MAX_CHUNKS, ChunkSizes};

/// Read size for the whole-file pass and for draining an over-cap tail.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// How often the whole-file wait checks for cancellation.
const INTERRUPT_POLL: Duration = Duration::from_millis(50);

/// Errors that abort processing of one file.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading the file failed.
    #[error("{0}")]
    Io(#[from] io::Error),

    /// The whole-file hash did not finish within its budget.
    #[error("whole-file hash timed out after {}s", .limit.as_secs())]
    TimedOut { limit: Duration },

    /// The caller asked to stop.
    #[error("cancelled")]
    Cancelled,
}

/// Chunks produced for one stream.
#[derive(Debug, Clone)]
pub struct ChunkList {
    /// Chunks in offset order.
    pub chunks: Vec<Chunk>,
    /// Bytes consumed from the stream.
    pub total_size: u64,
    /// Bounds the scanner ran with.
    pub sizes: ChunkSizes,
}

/// Chunks and hashes file streams.
#[derive(Debug, Clone, Copy)]
pub struct FileChunker {
    max_chunks: usize,
}

impl Default for FileChunker {
    fn default() -> Self {
        Self::new()
    }
}

impl FileChunker {
    /// Create a chunker with the standard chunk cap.
    pub fn new() -> Self {
        Self {
            max_chunks: ABSOLUTE_MAX_CHUNKS,
        }
    }

    /// Create a chunker that stops cutting after `max_chunks` chunks.
    pub fn with_max_chunks(max_chunks: usize) -> Self {
        Self {
            max_chunks: max_chunks.max(1),
        }
    }

    /// Chunk limit in effect.
    pub fn max_chunks(&self) -> usize {
        self.max_chunks
    }

    /// Cut `reader` into content-defined chunks.
    ///
    /// `size_hint` is the expected stream length and only selects the
    /// chunk-size bounds; the stream is read to its end either way. Once a
    /// single chunk slot is left, everything that remains becomes one final
    /// chunk.
    pub fn chunk<R, I>(
        &self,
        mut reader: R,
        size_hint: u64,
        interrupted: I,
    ) -> Result<ChunkList, PipelineError>
    where
        R: Read,
        I: Fn() -> bool,
    {
        let sizes = ChunkSizes::for_file_size(size_hint);
        let mut buf = vec![0u8; sizes.max];
        let mut filled = 0usize;
        let mut offset = 0u64;
        let mut eof = false;
        let mut chunks = Vec::new();

        loop {
            if interrupted() {
                return Err(PipelineError::Cancelled);
            }

            // Always top the window up to `max` so boundaries do not depend
            // on how the underlying reader splits its reads.
            if !eof && filled < buf.len() {
                let n = read_full(&mut reader, &mut buf[filled..])?;
                filled += n;
                eof = filled < buf.len();
            }

            if filled == 0 {
                break;
            }

            if chunks.len() + 1 >= self.max_chunks {
                let (size, hash) = hash_tail(&buf[..filled], &mut reader, eof, &interrupted)?;
                tracing::debug!(offset, size, "chunk cap reached, merging tail");
                chunks.push(Chunk::new(offset, size, hash));
                offset += size;
                break;
            }

            let cut = find_cut_point(&buf[..filled], &sizes);
            chunks.push(Chunk::new(offset, cut as u64, chunk_hash(&buf[..cut])));
            offset += cut as u64;

            buf.copy_within(cut..filled, 0);
            filled -= cut;
        }

        Ok(ChunkList {
            chunks,
            total_size: offset,
            sizes,
        })
    }

    /// Chunk a file, rewind it, then compute its whole-file digest.
    pub fn process<R, I>(
        &self,
        name: &str,
        mut reader: R,
        size_hint: u64,
        file_timeout: Duration,
        interrupted: I,
    ) -> Result<FileRecord, PipelineError>
    where
        R: Read + Seek + Send + 'static,
        I: Fn() -> bool,
    {
        let list = self.chunk(&mut reader, size_hint, &interrupted)?;

        reader.seek(SeekFrom::Start(0))?;
        let hash = hash_whole(reader, file_timeout, &interrupted)?;

        if list.total_size != size_hint {
            tracing::warn!(
                file = name,
                expected = size_hint,
                actual = list.total_size,
                "file size changed while hashing"
            );
        }

        Ok(FileRecord::new(
            name,
            list.total_size,
            hash,
            list.sizes.min as u64,
            list.sizes.max as u64,
            list.chunks,
        ))
    }
}

/// Compute the full BLAKE3 digest of a stream within `limit`.
///
/// The reads run on a worker thread, so a read that stalls is bounded by
/// `limit` as well. A stalled worker is told to stop and left to finish its
/// read on its own; its result is discarded.
pub fn hash_whole<R, I>(
    reader: R,
    limit: Duration,
    interrupted: I,
) -> Result<ContentHash, PipelineError>
where
    R: Read + Send + 'static,
    I: Fn() -> bool,
{
    let deadline = Instant::now() + limit;
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = mpsc::sync_channel(1);

    let worker_stop = Arc::clone(&stop);
    thread::Builder::new()
        .name("whole-file-hash".to_string())
        .spawn(move || {
            let _ = tx.send(hash_stream(reader, deadline, limit, &worker_stop));
        })?;

    loop {
        let wait = deadline
            .saturating_duration_since(Instant::now())
            .min(INTERRUPT_POLL);
        match rx.recv_timeout(wait) {
            Ok(result) => return result,
            Err(RecvTimeoutError::Timeout) => {
                if interrupted() {
                    stop.store(true, Ordering::Relaxed);
                    return Err(PipelineError::Cancelled);
                }
                if Instant::now() >= deadline {
                    stop.store(true, Ordering::Relaxed);
                    return Err(PipelineError::TimedOut { limit });
                }
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io::Error::other("whole-file hash worker exited").into());
            }
        }
    }
}

fn hash_stream<R: Read>(
    mut reader: R,
    deadline: Instant,
    limit: Duration,
    stop: &AtomicBool,
) -> Result<ContentHash, PipelineError> {
    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(PipelineError::Cancelled);
        }
        if Instant::now() >= deadline {
            return Err(PipelineError::TimedOut { limit });
        }

        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        hasher.update(&buffer[..n]);
    }

    // The last read may have returned after the budget ran out.
    if Instant::now() >= deadline {
        return Err(PipelineError::TimedOut { limit });
    }
    Ok(ContentHash::new(*hasher.finalize().as_bytes()))
}

/// Truncated digest of one chunk.
pub fn chunk_hash(data: &[u8]) -> ChunkHash {
    truncate(blake3::hash(data))
}

fn truncate(hash: blake3::Hash) -> ChunkHash {
    let mut bytes = [0u8; ChunkHash::LEN];
    bytes.copy_from_slice(&hash.as_bytes()[..ChunkHash::LEN]);
    ChunkHash::new(bytes)
}

/// Fill `buf` from `reader`, stopping early only at end of stream.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Hash the buffered bytes plus everything left in the stream as one chunk.
fn hash_tail<R, I>(
    buffered: &[u8],
    reader: &mut R,
    eof: bool,
    interrupted: &I,
) -> Result<(u64, ChunkHash), PipelineError>
where
    R: Read,
    I: Fn() -> bool,
{
    let mut hasher = Hasher::new();
    hasher.update(buffered);
    let mut size = buffered.len() as u64;

    if !eof {
        let mut scratch = vec![0u8; READ_BUFFER_SIZE];
        loop {
            if interrupted() {
                return Err(PipelineError::Cancelled);
            }
            match reader.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => {
                    hasher.update(&scratch[..n]);
                    size += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok((size, truncate(hasher.finalize())))
}
