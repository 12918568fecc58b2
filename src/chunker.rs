//! Payload chunking
//!
//! Splits a collector payload into consecutive, order-preserving chunks of
//! at most `chunk_size` records. Each chunk carries a copy of the payload's
//! `meta` block with `count` set to the chunk's own record count.

use hound_protocol::{UploadBody, UploadMeta};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Default number of records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Chunking errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ChunkError {
    #[error("chunk size must be at least 1")]
    ZeroChunkSize,
}

/// A collector payload: `{ "meta": {...}, "data": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    #[serde(default)]
    pub meta: UploadMeta,
    #[serde(default)]
    pub data: Vec<Value>,
}

/// One upload batch
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// 1-based position within the run
    pub ordinal: u64,
    pub records: Vec<Value>,
    pub meta: UploadMeta,
}

impl Chunk {
    /// Upload body for this chunk
    pub fn body(&self) -> UploadBody<'_> {
        UploadBody {
            data: &self.records,
            meta: &self.meta,
        }
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

/// Lazy iterator over the chunks of a payload
#[derive(Debug)]
pub struct Chunks {
    meta: UploadMeta,
    records: std::vec::IntoIter<Value>,
    chunk_size: usize,
    next_ordinal: u64,
}

impl Chunks {
    /// Number of records not yet emitted
    pub fn remaining_records(&self) -> usize {
        self.records.len()
    }
}

impl Iterator for Chunks {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.records.len() == 0 {
            return None;
        }
        let records: Vec<Value> = self.records.by_ref().take(self.chunk_size).collect();
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;

        Some(Chunk {
            ordinal,
            meta: self.meta.with_count(records.len() as u64),
            records,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.records.len().div_ceil(self.chunk_size);
        (n, Some(n))
    }
}

impl ExactSizeIterator for Chunks {}

/// Split `payload` into chunks of at most `chunk_size` records.
///
/// Records are neither reordered nor validated. An empty payload yields no
/// chunks.
pub fn chunk(payload: Payload, chunk_size: usize) -> Result<Chunks, ChunkError> {
    if chunk_size == 0 {
        return Err(ChunkError::ZeroChunkSize);
    }
    Ok(Chunks {
        meta: payload.meta,
        records: payload.data.into_iter(),
        chunk_size,
        next_ordinal: 1,
    })
}
