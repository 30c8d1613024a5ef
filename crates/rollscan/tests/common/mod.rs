//! Test harness for supervisor-level end-to-end tests.
//!
//! Provides a complete isolated environment: an in-memory store, a fresh
//! job registry, a scripted extractor standing in for the vision service,
//! and fake page sources so no PDF tooling or network is touched.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use rollscan::extract::{
    ExtractError, FooterSummary, HeaderMetadata, PageExtractor, PageKind, PagePayload,
    RecordEntry,
};
use rollscan::processor::{PageImage, PageSource};
use rollscan::worker::WorkerSupervisor;
use rollscan::{
    Database, ExtractionConfig, JobRegistry, JobSnapshot, ProcessError,
};

/// A scripted stand-in for the vision service.
///
/// Pages whose index is listed in `fail_pages` fail terminally on every
/// document; all other pages yield one record per page. Id card numbers
/// come from a process-wide counter so concurrent documents never collide.
pub struct ScriptedExtractor {
    fail_pages: HashSet<usize>,
    next_id: AtomicUsize,
    pub calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn new(fail_pages: impl IntoIterator<Item = usize>) -> Self {
        Self {
            fail_pages: fail_pages.into_iter().collect(),
            next_id: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl PageExtractor for ScriptedExtractor {
    async fn extract_page(
        &self,
        image: &PageImage,
        kind: PageKind,
    ) -> Result<PagePayload, ExtractError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // A little latency so jobs genuinely overlap.
        tokio::time::sleep(Duration::from_millis(5)).await;

        if self.fail_pages.contains(&image.index) {
            return Err(ExtractError::Timeout);
        }

        Ok(match kind {
            PageKind::Header => PagePayload::Header(HeaderMetadata {
                assembly_constituency: Some("42-North".to_string()),
                part_number: Some(86),
                publication_date: Some("2025-04-10".to_string()),
                ..Default::default()
            }),
            PageKind::Footer => PagePayload::Footer(FooterSummary::default()),
            PageKind::Records => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                PagePayload::Records(vec![RecordEntry {
                    serial_no: Some(image.index as i64),
                    id_card_no: Some(format!("TST{:07}", id)),
                    full_name: Some("Test Voter".to_string()),
                    gender: Some("female".to_string()),
                    age: Some(40),
                    section_name: Some("Ward 1".to_string()),
                    ..Default::default()
                }])
            }
        })
    }
}

/// Fake page source: renders `page_count` dummy pages, or fails like an
/// unreadable file.
pub struct FakeSource {
    label: String,
    page_count: usize,
}

impl FakeSource {
    pub fn new(label: &str, page_count: usize) -> Self {
        Self {
            label: label.to_string(),
            page_count,
        }
    }
}

impl PageSource for FakeSource {
    fn label(&self) -> &str {
        &self.label
    }

    fn render_pages(&self) -> Result<Vec<PageImage>, ProcessError> {
        if self.page_count == 0 {
            return Err(ProcessError::PdfProcessing(format!(
                "Failed to load PDF: {}",
                self.label
            )));
        }
        Ok((0..self.page_count)
            .map(|index| PageImage {
                index,
                png: vec![0u8; 4],
            })
            .collect())
    }
}

pub struct TestHarness {
    pub registry: Arc<JobRegistry>,
    pub db: Database,
    pub supervisor: WorkerSupervisor,
}

/// Builds a supervisor over fakes. `page_counts` maps a document file
/// name to its page count; unlisted names render zero pages and fail
/// like corrupt files.
pub fn harness(
    extractor: Arc<dyn PageExtractor>,
    page_counts: HashMap<String, usize>,
) -> TestHarness {
    init_tracing();

    let registry = Arc::new(JobRegistry::new());
    let db = Database::open_in_memory().expect("in-memory database");

    let extraction = ExtractionConfig {
        max_concurrent_requests: 3,
        split_record_pages: false,
        ..Default::default()
    };

    let supervisor = WorkerSupervisor::new(
        Arc::clone(&registry),
        db.clone(),
        extractor,
        extraction,
    )
    .with_source_factory(Arc::new(move |path, _dpi| {
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();
        let page_count = page_counts.get(&label).copied().unwrap_or(0);
        Arc::new(FakeSource::new(&label, page_count))
    }));

    TestHarness {
        registry,
        db,
        supervisor,
    }
}

/// Opt-in test logging: `RUST_LOG=rollscan=debug cargo test -- --nocapture`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// Polls until the job reaches a terminal state.
pub async fn wait_for_terminal(registry: &JobRegistry, job_id: &str) -> JobSnapshot {
    for _ in 0..500 {
        if let Some(snapshot) = registry.get(job_id) {
            if snapshot.is_finished() {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not reach a terminal state in time", job_id);
}
