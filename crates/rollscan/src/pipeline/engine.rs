//! Bounded concurrent fan-out over a document's pages.
//!
//! All pages are dispatched through `buffer_unordered`, so at most
//! `concurrency` extraction calls are in flight at once regardless of page
//! count. Results are re-ordered by page index before aggregation, so the
//! completion order of the underlying calls never leaks into the output.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt};
use tracing::warn;

use crate::extract::{PageExtractor, PageKind, PagePayload};
use crate::processor::{image, PageImage};

use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

/// Assigns a role to a page: first page carries roll metadata, last page
/// the summary table, everything between is a record grid. Single-page
/// documents are all header.
pub fn page_kind_for(index: usize, total: usize) -> PageKind {
    if index == 0 {
        PageKind::Header
    } else if index + 1 == total {
        PageKind::Footer
    } else {
        PageKind::Records
    }
}

/// A page's terminal failure, kept for the document summary.
#[derive(Debug, Clone)]
pub struct PageFailure {
    pub page_index: usize,
    pub cause: String,
}

/// Outcome of one page, success or terminal failure.
#[derive(Debug)]
pub struct PageOutcome {
    pub index: usize,
    pub kind: PageKind,
    pub result: Result<PagePayload, PageFailure>,
}

/// Aggregated result of one document's fan-out, pages in index order.
#[derive(Debug)]
pub struct DocumentResult {
    pub pages: Vec<PageOutcome>,
    pub page_count: usize,
    pub pages_succeeded: usize,
}

pub struct PageFanoutEngine {
    concurrency: usize,
    split_record_pages: bool,
}

impl PageFanoutEngine {
    pub fn new(concurrency: usize, split_record_pages: bool) -> Self {
        Self {
            concurrency: concurrency.max(1),
            split_record_pages,
        }
    }

    /// Extracts every page concurrently, bounded by the engine's
    /// concurrency limit.
    ///
    /// A page's terminal failure is recorded and the remaining pages
    /// continue; the only engine-level fault is zero pages succeeding.
    /// After each page completes (either way) the reporter receives a
    /// `PagesDone` event, so the final (completed == total) report is
    /// always delivered.
    pub async fn process_document(
        &self,
        label: &str,
        pages: Vec<PageImage>,
        extractor: Arc<dyn PageExtractor>,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentResult, PipelineError> {
        let total = pages.len();
        let completed = AtomicUsize::new(0);
        let completed = &completed;

        let mut outcomes: Vec<PageOutcome> = stream::iter(pages.into_iter().map(|page| {
            let extractor = Arc::clone(&extractor);
            let kind = page_kind_for(page.index, total);
            async move {
                let index = page.index;
                let result = self.extract_one(extractor.as_ref(), page, kind).await;
                let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
                progress.report(ProgressEvent::PagesDone {
                    label: label.to_string(),
                    completed: done,
                    total,
                });
                match result {
                    Ok(payload) => PageOutcome {
                        index,
                        kind,
                        result: Ok(payload),
                    },
                    Err(e) => {
                        warn!("page {}: giving up — {}", index + 1, e);
                        PageOutcome {
                            index,
                            kind,
                            result: Err(PageFailure {
                                page_index: index,
                                cause: e.to_string(),
                            }),
                        }
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        outcomes.sort_by_key(|o| o.index);

        let pages_succeeded = outcomes.iter().filter(|o| o.result.is_ok()).count();
        if pages_succeeded == 0 && total > 0 {
            let first_cause = outcomes
                .iter()
                .find_map(|o| o.result.as_ref().err().map(|f| f.cause.clone()))
                .unwrap_or_else(|| "unknown".to_string());
            return Err(PipelineError::AllPagesFailed { total, first_cause });
        }

        Ok(DocumentResult {
            pages: outcomes,
            page_count: total,
            pages_succeeded,
        })
    }

    async fn extract_one(
        &self,
        extractor: &dyn PageExtractor,
        page: PageImage,
        kind: PageKind,
    ) -> Result<PagePayload, crate::extract::ExtractError> {
        if kind == PageKind::Records && self.split_record_pages {
            return self.extract_record_halves(extractor, page).await;
        }
        extractor.extract_page(&page, kind).await
    }

    /// Extracts a record page as top/bottom halves, concatenating entries.
    /// Halves run sequentially so the page still occupies one concurrency
    /// slot. A half's failure drops only that half; the page fails only
    /// when neither half yields anything.
    async fn extract_record_halves(
        &self,
        extractor: &dyn PageExtractor,
        page: PageImage,
    ) -> Result<PagePayload, crate::extract::ExtractError> {
        let (top, bottom) = match image::split_page_png(&page.png) {
            Ok(halves) => halves,
            Err(e) => {
                warn!(
                    "page {}: split failed ({}), extracting whole page",
                    page.index + 1,
                    e
                );
                return extractor.extract_page(&page, PageKind::Records).await;
            }
        };

        let mut records = Vec::new();
        let mut last_err = None;
        for (half_name, png) in [("top", top), ("bottom", bottom)] {
            let half = PageImage {
                index: page.index,
                png,
            };
            match extractor.extract_page(&half, PageKind::Records).await {
                Ok(PagePayload::Records(mut entries)) => records.append(&mut entries),
                Ok(_) => {
                    warn!(
                        "page {} {} half: unexpected non-record payload",
                        page.index + 1,
                        half_name
                    );
                }
                Err(e) => {
                    warn!("page {} {} half failed: {}", page.index + 1, half_name, e);
                    last_err = Some(e);
                }
            }
        }

        match (records.is_empty(), last_err) {
            (true, Some(e)) => Err(e),
            _ => Ok(PagePayload::Records(records)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractError, FooterSummary, HeaderMetadata, RecordEntry};
    use crate::pipeline::progress::NoopProgress;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted extractor: configurable failures, per-call latency, and an
    /// in-flight high-water mark for the concurrency-bound property.
    struct ScriptedExtractor {
        fail_pages: HashSet<usize>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    impl ScriptedExtractor {
        fn new(fail_pages: impl IntoIterator<Item = usize>) -> Self {
            Self {
                fail_pages: fail_pages.into_iter().collect(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
            }
        }

        fn max_seen(&self) -> usize {
            self.max_in_flight.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PageExtractor for ScriptedExtractor {
        async fn extract_page(
            &self,
            image: &PageImage,
            kind: PageKind,
        ) -> Result<PagePayload, ExtractError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            // Later pages finish sooner, so completion order inverts
            // submission order.
            let delay = 40u64.saturating_sub((image.index as u64) * 4);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail_pages.contains(&image.index) {
                return Err(ExtractError::Timeout);
            }

            Ok(match kind {
                PageKind::Header => PagePayload::Header(HeaderMetadata::default()),
                PageKind::Footer => PagePayload::Footer(FooterSummary::default()),
                PageKind::Records => PagePayload::Records(vec![RecordEntry {
                    serial_no: Some(image.index as i64),
                    id_card_no: Some(format!("ID{:08}", image.index)),
                    section_name: Some("Ward 1".to_string()),
                    ..Default::default()
                }]),
            })
        }
    }

    struct CollectingReporter {
        events: Mutex<Vec<(usize, usize)>>,
    }

    impl CollectingReporter {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }
    }

    impl ProgressReporter for CollectingReporter {
        fn report(&self, event: ProgressEvent) {
            if let ProgressEvent::PagesDone {
                completed, total, ..
            } = event
            {
                self.events.lock().unwrap().push((completed, total));
            }
        }
    }

    fn dummy_pages(count: usize) -> Vec<PageImage> {
        (0..count)
            .map(|index| PageImage {
                index,
                png: vec![0u8; 8],
            })
            .collect()
    }

    #[test]
    fn test_page_kind_assignment() {
        assert_eq!(page_kind_for(0, 5), PageKind::Header);
        assert_eq!(page_kind_for(1, 5), PageKind::Records);
        assert_eq!(page_kind_for(3, 5), PageKind::Records);
        assert_eq!(page_kind_for(4, 5), PageKind::Footer);
        // Degenerate layouts.
        assert_eq!(page_kind_for(0, 1), PageKind::Header);
        assert_eq!(page_kind_for(1, 2), PageKind::Footer);
    }

    #[tokio::test]
    async fn test_results_ordered_by_page_index() {
        let engine = PageFanoutEngine::new(8, false);
        let extractor = Arc::new(ScriptedExtractor::new([]));

        let result = engine
            .process_document("roll.pdf", dummy_pages(10), extractor, &NoopProgress)
            .await
            .unwrap();

        let indices: Vec<usize> = result.pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, (0..10).collect::<Vec<_>>());
        assert_eq!(result.pages_succeeded, 10);
    }

    #[tokio::test]
    async fn test_concurrency_limit_is_respected() {
        let engine = PageFanoutEngine::new(3, false);
        let extractor = Arc::new(ScriptedExtractor::new([]));

        engine
            .process_document(
                "roll.pdf",
                dummy_pages(12),
                Arc::clone(&extractor) as Arc<dyn PageExtractor>,
                &NoopProgress,
            )
            .await
            .unwrap();

        assert!(
            extractor.max_seen() <= 3,
            "saw {} calls in flight with limit 3",
            extractor.max_seen()
        );
    }

    #[tokio::test]
    async fn test_single_page_failure_does_not_abort_document() {
        let engine = PageFanoutEngine::new(4, false);
        let extractor = Arc::new(ScriptedExtractor::new([1]));

        let result = engine
            .process_document("roll.pdf", dummy_pages(3), extractor, &NoopProgress)
            .await
            .unwrap();

        assert_eq!(result.page_count, 3);
        assert_eq!(result.pages_succeeded, 2);
        assert!(result.pages[0].result.is_ok());
        assert!(result.pages[2].result.is_ok());
        let failure = result.pages[1].result.as_ref().unwrap_err();
        assert_eq!(failure.page_index, 1);
        assert!(failure.cause.contains("timed out"));
    }

    #[tokio::test]
    async fn test_all_pages_failed_is_engine_fault() {
        let engine = PageFanoutEngine::new(4, false);
        let extractor = Arc::new(ScriptedExtractor::new(0..4));

        let result = engine
            .process_document("roll.pdf", dummy_pages(4), extractor, &NoopProgress)
            .await;

        match result {
            Err(PipelineError::AllPagesFailed { total, .. }) => assert_eq!(total, 4),
            other => panic!("expected AllPagesFailed, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_progress_reported_per_page_with_final_total() {
        let engine = PageFanoutEngine::new(2, false);
        let extractor = Arc::new(ScriptedExtractor::new([2]));
        let reporter = CollectingReporter::new();

        engine
            .process_document("roll.pdf", dummy_pages(5), extractor, &reporter)
            .await
            .unwrap();

        let events = reporter.events.lock().unwrap();
        // One event per page, success or failure alike.
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|(_, total)| *total == 5));
        // The final (total/total) report is always delivered.
        assert!(events.iter().any(|(completed, _)| *completed == 5));
    }

    #[tokio::test]
    async fn test_split_record_pages_merges_halves() {
        // A real PNG so the splitter can decode it.
        let png = {
            use ::image::{DynamicImage, ImageFormat, RgbImage};
            use std::io::Cursor;
            let img = DynamicImage::ImageRgb8(RgbImage::new(20, 40));
            let mut buf = Cursor::new(Vec::new());
            img.write_to(&mut buf, ImageFormat::Png).unwrap();
            buf.into_inner()
        };
        let pages = vec![
            PageImage {
                index: 0,
                png: png.clone(),
            },
            PageImage {
                index: 1,
                png: png.clone(),
            },
            PageImage { index: 2, png },
        ];

        let engine = PageFanoutEngine::new(4, true);
        let extractor = Arc::new(ScriptedExtractor::new([]));

        let result = engine
            .process_document(
                "roll.pdf",
                pages,
                Arc::clone(&extractor) as Arc<dyn PageExtractor>,
                &NoopProgress,
            )
            .await
            .unwrap();

        // The middle page is a record page extracted in two halves.
        match &result.pages[1].result {
            Ok(PagePayload::Records(entries)) => assert_eq!(entries.len(), 2),
            other => panic!("expected records, got {:?}", other),
        }
        // Header (1) + footer (1) + record halves (2).
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_empty_document_yields_empty_result() {
        let engine = PageFanoutEngine::new(4, false);
        let extractor = Arc::new(ScriptedExtractor::new([]));

        let result = engine
            .process_document("roll.pdf", Vec::new(), extractor, &NoopProgress)
            .await
            .unwrap();

        assert_eq!(result.page_count, 0);
        assert!(result.pages.is_empty());
    }
}
