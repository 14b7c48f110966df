//! PDF extraction backed by lopdf, with pdf-extract as a fallback

use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use lopdf::{Document, ObjectId};

use super::extractor::{DocumentExtractor, ExtractionError, PageSource};

/// PDF files must start with this marker (some writers prepend junk, so we
/// look within the first kilobyte)
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// Page-by-page PDF text extractor
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }

    fn has_pdf_header(data: &[u8]) -> bool {
        let window = &data[..data.len().min(MAGIC_SEARCH_WINDOW)];
        window.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC)
    }
}

impl DocumentExtractor for PdfExtractor {
    fn open(&self, data: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError> {
        if !Self::has_pdf_header(data) {
            return Err(ExtractionError::CorruptDocument(
                "missing %PDF header".to_string(),
            ));
        }

        let doc = Document::load_mem(data)
            .map_err(|e| ExtractionError::CorruptDocument(format!("failed to load PDF: {}", e)))?;

        if doc.is_encrypted() {
            return Err(ExtractionError::UnsupportedEncoding(
                "document is encrypted".to_string(),
            ));
        }

        let pages = doc.get_pages();
        if pages.is_empty() {
            return Err(ExtractionError::CorruptDocument(
                "document has no pages".to_string(),
            ));
        }

        Ok(Box::new(PdfPages {
            doc,
            pages,
            raw: data.to_vec(),
            fallback: None,
        }))
    }

    fn name(&self) -> &str {
        "lopdf"
    }
}

/// An opened PDF
struct PdfPages {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    raw: Vec<u8>,
    /// pdf-extract output split per page, computed on first need
    fallback: Option<Vec<String>>,
}

impl PdfPages {
    fn fallback_page(&mut self, page_number: u32) -> String {
        if self.fallback.is_none() {
            let raw = &self.raw;
            // pdf-extract panics on some malformed fonts
            let text = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(raw)));
            let text = match text {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::debug!("pdf-extract fallback failed: {}", e);
                    String::new()
                }
                Err(_) => {
                    tracing::warn!("pdf-extract panicked, fallback unavailable");
                    String::new()
                }
            };
            self.fallback = Some(split_pages(&text, self.pages.len()));
        }

        self.fallback
            .as_ref()
            .and_then(|pages| pages.get(page_number.saturating_sub(1) as usize))
            .cloned()
            .unwrap_or_default()
    }
}

/// Split whole-document text on form feeds. When the page breaks cannot be
/// recovered the text is attributed to the first page.
fn split_pages(text: &str, page_count: usize) -> Vec<String> {
    let pages: Vec<String> = text.split('\u{c}').map(str::to_string).collect();
    if pages.len() == page_count {
        return pages;
    }
    let mut pages = vec![String::new(); page_count.max(1)];
    pages[0] = text.replace('\u{c}', "\n");
    pages
}

impl PageSource for PdfPages {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&mut self, page_number: u32) -> Result<String, ExtractionError> {
        let page_id = *self.pages.get(&page_number).ok_or_else(|| {
            ExtractionError::CorruptDocument(format!("page {} does not exist", page_number))
        })?;

        let text = match self.doc.extract_text(&[page_number]) {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) | Err(_) => {
                // Raw content stream scan, then pdf-extract
                let scanned = self
                    .doc
                    .get_page_content(page_id)
                    .map(|content| extract_text_from_content(&content))
                    .unwrap_or_default();
                if scanned.trim().is_empty() {
                    self.fallback_page(page_number)
                } else {
                    scanned
                }
            }
        };

        Ok(cleanup_pdf_text(&text))
    }
}

/// Pull string operands of Tj/TJ operators out of a content stream
fn extract_text_from_content(content: &[u8]) -> String {
    let content_str = String::from_utf8_lossy(content);
    let mut text = String::new();
    let mut in_text_block = false;
    let mut current_text = String::new();

    for line in content_str.lines() {
        let line = line.trim();

        if line == "BT" {
            in_text_block = true;
            continue;
        }

        if line == "ET" {
            in_text_block = false;
            if !current_text.is_empty() {
                text.push_str(&current_text);
                text.push('\n');
                current_text.clear();
            }
            continue;
        }

        if in_text_block && (line.ends_with("Tj") || line.ends_with("TJ")) {
            if let (Some(start), Some(end)) = (line.find('('), line.rfind(')')) {
                if start < end {
                    let decoded = line[start + 1..end]
                        .replace("\\n", "\n")
                        .replace("\\r", "\r")
                        .replace("\\t", "\t")
                        .replace("\\(", "(")
                        .replace("\\)", ")")
                        .replace("\\\\", "\\");
                    current_text.push_str(&decoded);
                }
            }
        }
    }

    text
}

/// Normalize typographic characters and drop blank lines
fn cleanup_pdf_text(text: &str) -> String {
    text.replace('\0', "")
        .replace(['\u{2010}', '\u{2011}', '\u{2013}'], "-")
        .replace('\u{2014}', "--")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{2022}', "* ")
        .replace('\u{2026}', "...")
        .replace('\u{00A0}', " ")
        .replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
