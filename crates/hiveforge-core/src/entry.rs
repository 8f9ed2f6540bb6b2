//! File, chunk and directory entry types.

use std::fmt;
use std::str::FromStr;

use compact_str::CompactString;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Identifier reported for every chunked file.
pub const CHUNK_ALGORITHM: &str = "FastCDC";

/// Error returned when a hex digest cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {expected}-byte hex digest: {input:?}")]
pub struct ParseDigestError {
    input: String,
    expected: usize,
}

macro_rules! hex_digest {
    ($(#[$meta:meta])* $name:ident, $len:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Number of bytes in the digest.
            pub const LEN: usize = $len;

            /// Create a digest from raw bytes.
            pub fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Get the digest as a lowercase hex string.
            pub fn to_hex(&self) -> String {
                self.0.iter().map(|b| format!("{b:02x}")).collect()
            }

            /// Get the raw digest bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = ParseDigestError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let err = || ParseDigestError {
                    input: s.to_string(),
                    expected: $len,
                };
                if s.len() != $len * 2 || !s.is_ascii() {
                    return Err(err());
                }
                let mut bytes = [0u8; $len];
                for (i, byte) in bytes.iter_mut().enumerate() {
                    *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
                }
                Ok(Self(bytes))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_digest!(
    /// BLAKE3 digest of a single chunk, truncated to 128 bits.
    ChunkHash,
    16
);

hex_digest!(
    /// Full 256-bit BLAKE3 digest of a file's contents.
    ContentHash,
    32
);

/// One content-defined chunk of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Truncated digest of the chunk bytes.
    pub hash: ChunkHash,
    /// Chunk length in bytes.
    pub size: u64,
    /// Byte position of the chunk within its file.
    pub offset: u64,
}

impl Chunk {
    /// Create a new chunk record.
    pub fn new(offset: u64, size: u64, hash: ChunkHash) -> Self {
        Self { hash, size, offset }
    }

    /// Offset one past the last byte of this chunk.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }
}

/// Identity of a hashed file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// File name (not full path).
    pub name: CompactString,
    /// Number of bytes chunked.
    pub size: u64,
    /// Whole-file digest.
    pub hash: ContentHash,
}

/// Parameters the chunker ran with for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingInfo {
    /// Chunking algorithm identifier.
    pub algorithm: CompactString,
    /// Mean chunk size actually produced (0 for empty files).
    pub average_chunk_size: u64,
    /// Minimum chunk size used for this file.
    pub min_chunk_size: u64,
    /// Maximum chunk size used for this file.
    pub max_chunk_size: u64,
    /// Number of chunks produced.
    pub total_chunks: u64,
}

/// Chunking and hashing result for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    #[serde(rename = "file_info")]
    pub info: FileInfo,
    #[serde(rename = "chunking_info")]
    pub chunking: ChunkingInfo,
    pub chunks: Vec<Chunk>,
}

impl FileRecord {
    /// Assemble a record from a finished chunk list.
    ///
    /// `total_size` is the number of bytes the chunk list covers.
    pub fn new(
        name: impl Into<CompactString>,
        total_size: u64,
        whole_file_hash: ContentHash,
        min_chunk_size: u64,
        max_chunk_size: u64,
        chunks: Vec<Chunk>,
    ) -> Self {
        let total_chunks = chunks.len() as u64;
        let average_chunk_size = if total_chunks > 0 {
            total_size / total_chunks
        } else {
            0
        };

        Self {
            info: FileInfo {
                name: name.into(),
                size: total_size,
                hash: whole_file_hash,
            },
            chunking: ChunkingInfo {
                algorithm: CHUNK_ALGORITHM.into(),
                average_chunk_size,
                min_chunk_size,
                max_chunk_size,
                total_chunks,
            },
            chunks,
        }
    }

    /// File name.
    pub fn name(&self) -> &str {
        &self.info.name
    }

    /// Total size in bytes.
    pub fn total_size(&self) -> u64 {
        self.info.size
    }

    /// Whole-file digest.
    pub fn whole_file_hash(&self) -> &ContentHash {
        &self.info.hash
    }

    /// Check that chunks start at zero, abut each other and cover the file.
    pub fn is_contiguous(&self) -> bool {
        let mut expected = 0u64;
        for chunk in &self.chunks {
            if chunk.offset != expected {
                return false;
            }
            expected = chunk.end();
        }
        expected == self.info.size
    }
}

/// Type of entry in the result tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single file or directory in the result tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// File/directory name (not full path).
    pub name: CompactString,

    /// Entry type.
    #[serde(rename = "type")]
    pub kind: EntryKind,

    /// Size in bytes (sum of descendant file sizes for directories).
    pub size: u64,

    /// Children in directory listing order (directories only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DirectoryEntry>,

    /// Chunking result (files only).
    #[serde(rename = "file_result", default, skip_serializing_if = "Option::is_none")]
    pub file_record: Option<FileRecord>,
}

impl DirectoryEntry {
    /// Create an empty directory entry.
    pub fn new_directory(name: impl Into<CompactString>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            size: 0,
            children: Vec::new(),
            file_record: None,
        }
    }

    /// Create a file entry that owns its record.
    pub fn new_file(record: FileRecord) -> Self {
        Self {
            name: record.info.name.clone(),
            kind: EntryKind::File,
            size: record.total_size(),
            children: Vec::new(),
            file_record: Some(record),
        }
    }

    /// Check if this entry is a directory.
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Check if this entry is a file.
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Append a child, folding its size into this directory's size.
    pub fn push_child(&mut self, child: DirectoryEntry) {
        self.size += child.size;
        self.children.push(child);
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// Number of files in this subtree (1 for a file entry).
    pub fn file_count(&self) -> u64 {
        match self.kind {
            EntryKind::File => 1,
            EntryKind::Directory => self.children.iter().map(DirectoryEntry::file_count).sum(),
        }
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&DirectoryEntry> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Check the size invariant for this entry and all descendants.
    pub fn sizes_consistent(&self) -> bool {
        match self.kind {
            EntryKind::File => self
                .file_record
                .as_ref()
                .is_none_or(|r| r.total_size() == self.size),
            EntryKind::Directory => {
                self.children.iter().map(|c| c.size).sum::<u64>() == self.size
                    && self.children.iter().all(DirectoryEntry::sizes_consistent)
            }
        }
    }
}
