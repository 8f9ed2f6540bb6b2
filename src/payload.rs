//! Request body encoding for hash results.

use std::io::Write;

use color_eyre::eyre::{Context, Result};
use flate2::Compression;
use flate2::write::GzEncoder;

use hiveforge_core::HashRunSummary;

/// JSON bodies longer than this are gzip-compressed.
pub const GZIP_THRESHOLD: usize = 1024;

/// Value of the `Content-Encoding` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    Identity,
    Gzip,
}

impl ContentEncoding {
    /// Header value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Gzip => "gzip",
        }
    }
}

/// An encoded request body.
#[derive(Debug, Clone)]
pub struct Payload {
    pub body: Vec<u8>,
    pub encoding: ContentEncoding,
    /// Length of the JSON before compression.
    pub json_len: usize,
}

/// Serialize a summary and compress it when large.
pub fn encode(summary: &HashRunSummary) -> Result<Payload> {
    let json = serde_json::to_vec(summary).wrap_err("Failed to encode hash result")?;
    encode_json(json)
}

/// Compress already-serialized JSON when it exceeds [`GZIP_THRESHOLD`].
pub fn encode_json(json: Vec<u8>) -> Result<Payload> {
    let json_len = json.len();
    if json_len <= GZIP_THRESHOLD {
        return Ok(Payload {
            body: json,
            encoding: ContentEncoding::Identity,
            json_len,
        });
    }

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&json)
        .wrap_err("Failed to compress hash result")?;
    let body = encoder.finish().wrap_err("Failed to compress hash result")?;
    tracing::debug!(json_len, compressed = body.len(), "compressed payload");

    Ok(Payload {
        body,
        encoding: ContentEncoding::Gzip,
        json_len,
    })
}
