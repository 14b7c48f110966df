//! Document extraction and chunking

mod chunker;
mod extractor;
mod pdf;
#[cfg(test)]
mod scripted;

pub use chunker::TextChunker;
pub use extractor::{DocumentExtractor, ExtractionError, PageSource, PageText};
pub use pdf::PdfExtractor;

#[cfg(test)]
pub(crate) use pdf::tests::build_pdf;
#[cfg(test)]
pub(crate) use scripted::ScriptedExtractor;
