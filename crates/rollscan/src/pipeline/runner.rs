//! Document orchestrator: render → fan out → assemble → commit.
//!
//! One `run` call processes one document end to end. Failures at any step
//! are document-level: the caller records them and moves on to the next
//! document in the job.

use std::sync::Arc;

use tracing::{debug, info_span, Instrument};

use crate::db::{document_repo, Database};
use crate::extract::PageExtractor;
use crate::processor::PageSource;

use super::context::DocumentContext;
use super::engine::{PageFailure, PageFanoutEngine};
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

/// Result of one committed document.
#[derive(Debug)]
pub struct DocumentReport {
    pub file_name: String,
    pub document_id: i64,
    pub page_count: usize,
    pub pages_succeeded: usize,
    pub records_inserted: usize,
    pub failed_pages: Vec<PageFailure>,
}

pub struct DocumentPipeline {
    db: Database,
    extractor: Arc<dyn PageExtractor>,
    engine: PageFanoutEngine,
}

impl DocumentPipeline {
    pub fn new(db: Database, extractor: Arc<dyn PageExtractor>, engine: PageFanoutEngine) -> Self {
        Self {
            db,
            extractor,
            engine,
        }
    }

    /// Runs the full pipeline for a single document. The completion or
    /// failure event is always reported exactly once.
    pub async fn run(
        &self,
        source: Arc<dyn PageSource>,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentReport, PipelineError> {
        let label = source.label().to_string();
        let span = info_span!("pipeline", document = %label);

        match self.run_inner(&label, source, progress).instrument(span).await {
            Ok(report) => {
                progress.report(ProgressEvent::DocumentCompleted {
                    label,
                    pages_succeeded: report.pages_succeeded,
                    page_count: report.page_count,
                    records_inserted: report.records_inserted,
                });
                Ok(report)
            }
            Err(e) => {
                progress.report(ProgressEvent::DocumentFailed {
                    label,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn run_inner(
        &self,
        label: &str,
        source: Arc<dyn PageSource>,
        progress: &dyn ProgressReporter,
    ) -> Result<DocumentReport, PipelineError> {
        // Step 1: Render pages. Poppler work is blocking, keep it off the
        // async workers.
        progress.report(ProgressEvent::Phase {
            message: format!("Rendering pages from {}...", label),
        });
        let pages = {
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || source.render_pages())
                .await
                .map_err(|e| PipelineError::RenderTask(e.to_string()))??
        };
        debug!("rendered {} page(s)", pages.len());

        // Step 2: Fan out extraction calls.
        progress.report(ProgressEvent::Phase {
            message: format!("Extracting data from {} page(s)...", pages.len()),
        });
        let result = self
            .engine
            .process_document(label, pages, Arc::clone(&self.extractor), progress)
            .await?;

        // Step 3: Assemble rows from the aggregated payloads.
        let ctx = DocumentContext::from_result(label, result);
        let page_count = ctx.page_count;
        let pages_succeeded = ctx.pages_succeeded;
        let failed_pages = ctx.failures.clone();

        // Step 4: Commit everything in one transaction.
        progress.report(ProgressEvent::Phase {
            message: format!("Saving extracted data for {}...", label),
        });
        let doc = ctx.into_new_document()?;
        let records_inserted = doc.sections.iter().map(|s| s.voters.len()).sum();
        let document_id = document_repo::insert_document(&self.db, &doc)?;

        Ok(DocumentReport {
            file_name: label.to_string(),
            document_id,
            page_count,
            pages_succeeded,
            records_inserted,
            failed_pages,
        })
    }
}
