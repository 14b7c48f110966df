//! Chunk types with provenance back into the source PDF

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::JobId;

/// Inclusive 1-based page span a chunk was taken from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    pub fn single(page: u32) -> Self {
        Self {
            start: page,
            end: page,
        }
    }
}

/// Half-open byte span within the extracted text of `PageRange::start`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ByteRange {
    pub start: usize,
    pub end: usize,
}

/// One unit of extracted, ordered content
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub chunk_id: Uuid,
    /// Owning job; a back-reference only
    pub job_id: JobId,
    /// 0-based position in document order
    pub sequence_index: u32,
    pub text: String,
    pub page_range: PageRange,
    pub byte_range: ByteRange,
}

impl Chunk {
    pub fn new(
        job_id: JobId,
        sequence_index: u32,
        text: String,
        page_range: PageRange,
        byte_range: ByteRange,
    ) -> Self {
        Self {
            chunk_id: Uuid::new_v4(),
            job_id,
            sequence_index,
            text,
            page_range,
            byte_range,
        }
    }
}

/// Chunk projection served to clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkSummary {
    pub chunk_id: Uuid,
    pub sequence_index: u32,
    pub text: String,
    pub page_range: PageRange,
}

impl From<&Chunk> for ChunkSummary {
    fn from(chunk: &Chunk) -> Self {
        Self {
            chunk_id: chunk.chunk_id,
            sequence_index: chunk.sequence_index,
            text: chunk.text.clone(),
            page_range: chunk.page_range,
        }
    }
}
