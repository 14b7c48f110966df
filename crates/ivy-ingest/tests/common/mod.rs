//! Shared helpers for the HTTP integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use ivy_ingest::{
    config::IngestConfig,
    ingestion::{DocumentExtractor, ExtractionError, PageSource},
    server::{build_router, state::AppState},
    storage::InMemoryJobRegistry,
};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const BOUNDARY: &str = "ivy-test-boundary";

/// Extractor with scripted pages, delays and panics
#[derive(Clone, Default)]
pub struct FakeExtractor {
    pub pages: Vec<String>,
    pub page_delay: Option<Duration>,
    pub panic_on_page: Option<u32>,
}

impl FakeExtractor {
    pub fn pages(count: usize) -> Self {
        Self {
            pages: (1..=count)
                .map(|n| format!("Page {} discusses the migration plan in some detail.", n))
                .collect(),
            ..Default::default()
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.page_delay = Some(delay);
        self
    }

    pub fn panicking_on(mut self, page: u32) -> Self {
        self.panic_on_page = Some(page);
        self
    }
}

impl DocumentExtractor for FakeExtractor {
    fn open(&self, _data: &[u8]) -> Result<Box<dyn PageSource>, ExtractionError> {
        Ok(Box::new(self.clone()))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

impl PageSource for FakeExtractor {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_text(&mut self, page_number: u32) -> Result<String, ExtractionError> {
        if let Some(delay) = self.page_delay {
            std::thread::sleep(delay);
        }
        if self.panic_on_page == Some(page_number) {
            panic!("unsupported font program on page {}", page_number);
        }
        Ok(self.pages[page_number as usize - 1].clone())
    }
}

pub struct TestApp {
    pub router: Router,
    pub registry: Arc<InMemoryJobRegistry>,
    pub state: AppState,
}

pub fn config(workers: usize, queue_capacity: usize) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.processing.workers = workers;
    config.processing.queue_capacity = queue_capacity;
    config.processing.retry_backoff_ms = 1;
    config.server.wait_poll_ms = 10;
    config
}

pub fn app(config: IngestConfig, extractor: impl DocumentExtractor + 'static) -> TestApp {
    let registry = Arc::new(InMemoryJobRegistry::new());
    let state = AppState::with_components(config, registry.clone(), Arc::new(extractor));
    TestApp {
        router: build_router(state.clone()),
        registry,
        state,
    }
}

/// One part of a multipart form
pub enum Part<'a> {
    File {
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::File {
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
            Part::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                        .as_bytes(),
                );
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn upload_request(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn pdf_upload(uri: &str, data: &[u8]) -> Request<Body> {
    upload_request(
        uri,
        &[Part::File {
            filename: "report.pdf",
            content_type: "application/pdf",
            data,
        }],
    )
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, body)
}

pub async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn post(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::post(uri).body(Body::empty()).unwrap()).await
}

/// Poll the status endpoint until the job is terminal, returning every
/// snapshot seen along the way
pub async fn poll_until_terminal(router: &Router, job_id: &str) -> Vec<Value> {
    let uri = format!("/api/jobs/{}/status", job_id);
    let mut seen = Vec::new();
    for _ in 0..1000 {
        let (status, body) = get(router, &uri).await;
        assert_eq!(status, StatusCode::OK, "unexpected status body: {}", body);
        let state = body["status"].as_str().unwrap().to_string();
        seen.push(body);
        if state == "completed" || state == "failed" {
            return seen;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} never reached a terminal state", job_id);
}

/// A real PDF with one text line per page, padded with an unreferenced
/// stream up to at least `min_size` bytes
pub fn build_pdf(pages: &[String], min_size: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 750.into()]),
                Operation::new("Tj", vec![Object::string_literal(text.as_str())]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    if min_size > 0 {
        doc.add_object(Stream::new(dictionary! {}, vec![b'0'; min_size]));
    }

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}
