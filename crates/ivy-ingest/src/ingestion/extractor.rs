//! Extraction capability invoked by the parsing worker

use thiserror::Error;

/// Why extraction of a document stopped
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// Bytes are not a readable PDF
    #[error("Corrupt document: {0}")]
    CorruptDocument(String),

    /// Encrypted or otherwise undecodable content
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Readable document without any text (e.g. scanned images)
    #[error("No extractable text: {0}")]
    NoText(String),

    /// Wall-clock ceiling reached
    #[error("timeout")]
    Timeout,

    /// Failure that may succeed on retry (crashed extraction task, I/O hiccup)
    #[error("Transient extraction failure: {0}")]
    Transient(String),

    /// Worker observed a cancellation signal at a checkpoint
    #[error("cancelled")]
    Cancelled,
}

impl ExtractionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExtractionError::Transient(_))
    }
}

/// Opens raw document bytes for page-by-page extraction
pub trait DocumentExtractor: Send + Sync {
    /// Validate and open a document. Called off the async runtime.
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError>;

    /// Name for logging
    fn name(&self) -> &str;
}

/// An opened document; pages are numbered from 1
pub trait PageSource: Send {
    fn page_count(&self) -> u32;

    /// Extracted text of one page. Called off the async runtime.
    fn page_text(&mut self, page_number: u32) -> Result<String, ExtractionError>;
}

/// Text of one extracted page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageText {
    /// 1-based page number
    pub page_number: u32,
    pub text: String,
}
