//! Scripted extractor for exercising failure paths in unit tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::extractor::{DocumentExtractor, ExtractionError, PageSource};

#[derive(Default)]
pub(crate) struct ScriptedExtractor {
    pub pages: Vec<String>,
    pub panic_on_page: Option<u32>,
    /// Number of opens that fail with a transient error before succeeding
    pub transient_failures: AtomicU32,
    pub page_delay: Option<Duration>,
    /// Per-page delay for the first opened document, replacing `page_delay`
    pub first_open_delay: Option<Duration>,
    pub opens: AtomicU32,
}

impl ScriptedExtractor {
    pub fn with_pages(pages: &[&str]) -> Self {
        Self {
            pages: pages.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }
}

struct ScriptedPages {
    pages: Vec<String>,
    panic_on_page: Option<u32>,
    page_delay: Option<Duration>,
}

impl DocumentExtractor for ScriptedExtractor {
    fn open(&self, _data: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ExtractionError::Transient("flaky open".to_string()));
        }

        let previous_opens = self.opens.fetch_add(1, Ordering::SeqCst);
        let page_delay = match self.first_open_delay {
            Some(delay) if previous_opens == 0 => Some(delay),
            _ => self.page_delay,
        };

        Ok(Box::new(ScriptedPages {
            pages: self.pages.clone(),
            panic_on_page: self.panic_on_page,
            page_delay,
        }))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl PageSource for ScriptedPages {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&mut self, page_number: u32) -> Result<String, ExtractionError> {
        if let Some(delay) = self.page_delay {
            std::thread::sleep(delay);
        }
        if self.panic_on_page == Some(page_number) {
            panic!("font table exploded on page {}", page_number);
        }
        Ok(self.pages[page_number as usize - 1].clone())
    }
}
