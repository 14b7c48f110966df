//! Text chunking with page and byte-offset tracking

use unicode_segmentation::UnicodeSegmentation;

use super::extractor::PageText;
use crate::config::ChunkingConfig;
use crate::types::{ByteRange, Chunk, JobId, PageRange};

/// Sentence-aware chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in bytes
    chunk_size: usize,
    /// Overlap carried from the end of one chunk into the next
    overlap: usize,
    /// Trailing pieces below this size are folded into the previous chunk
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            min_size: 50,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self {
            min_size: config.min_chunk_size,
            ..Self::new(config.chunk_size, config.chunk_overlap)
        }
    }

    /// Chunk extracted pages into one contiguous, 0-indexed sequence
    pub fn chunk_pages(&self, job_id: &JobId, pages: &[PageText]) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in pages {
            for range in self.chunk_spans(&page.text) {
                chunks.push(Chunk::new(
                    job_id.clone(),
                    chunks.len() as u32,
                    page.text[range.start..range.end].to_string(),
                    PageRange::single(page.page_number),
                    range,
                ));
            }
        }

        chunks
    }

    /// Byte spans of the chunks for one page of text; each span is already
    /// trimmed of surrounding whitespace
    fn chunk_spans(&self, text: &str) -> Vec<ByteRange> {
        let mut spans: Vec<ByteRange> = Vec::new();
        let mut start = 0usize;
        let mut end = 0usize;

        for (offset, piece) in self.pieces(text) {
            if end > start && (end - start) + piece.len() > self.chunk_size {
                if let Some(span) = trimmed_span(text, start, end) {
                    spans.push(span);
                }
                start = self.overlap_start(text, start, end);
            }
            if end == start {
                start = offset;
            }
            end = offset + piece.len();
        }

        if end > start {
            if let Some(span) = trimmed_span(text, start, end) {
                spans.push(span);
            }
        }

        // Fold a tiny tail into its predecessor instead of emitting a fragment
        if spans.len() >= 2 {
            let last = spans[spans.len() - 1];
            if last.end - last.start < self.min_size {
                spans.pop();
                if let Some(prev) = spans.last_mut() {
                    prev.end = last.end;
                }
            }
        }

        spans
    }

    /// Sentences, with sentences longer than a chunk cut at char boundaries
    fn pieces<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let mut pieces = Vec::new();

        for (offset, sentence) in text.split_sentence_bound_indices() {
            if sentence.len() <= self.chunk_size {
                pieces.push((offset, sentence));
                continue;
            }

            let mut i = 0;
            while i < sentence.len() {
                let mut j = (i + self.chunk_size).min(sentence.len());
                while !sentence.is_char_boundary(j) {
                    j -= 1;
                }
                if j == i {
                    j = i + sentence[i..].chars().next().map_or(1, char::len_utf8);
                }
                pieces.push((offset + i, &sentence[i..j]));
                i = j;
            }
        }

        pieces
    }

    /// Where the next chunk starts so that it repeats the tail of [start, end)
    fn overlap_start(&self, text: &str, start: usize, end: usize) -> usize {
        if self.overlap == 0 {
            return end;
        }

        let mut candidate = end.saturating_sub(self.overlap).max(start + 1);
        while candidate < end && !text.is_char_boundary(candidate) {
            candidate += 1;
        }
        if candidate >= end {
            return end;
        }

        let tail = &text[candidate..end];

        // Prefer a sentence boundary, then a word boundary
        if let Some(pos) = tail.find(". ") {
            return candidate + pos + 2;
        }
        if let Some((pos, c)) = tail.char_indices().find(|(_, c)| c.is_whitespace()) {
            return candidate + pos + c.len_utf8();
        }

        candidate
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn trimmed_span(text: &str, start: usize, end: usize) -> Option<ByteRange> {
    let slice = &text[start..end];
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    if leading == slice.len() {
        return None;
    }
    Some(ByteRange {
        start: start + leading,
        end: end - trailing,
    })
}
