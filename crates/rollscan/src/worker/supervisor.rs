//! Job supervisor: one isolated tokio task per submitted job.
//!
//! `submit` validates the upload, creates the registry entry, spawns the
//! task, and returns the job id immediately — it never blocks on document
//! work. Inside the task, documents run strictly sequentially, each with
//! its own page-level concurrency limit, and a drop guard guarantees the
//! registry always ends in a terminal state even if the task unwinds.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::config::{Config, ExtractionConfig};
use crate::db::Database;
use crate::error::WorkerError;
use crate::extract::{PageExtractor, VisionClient};
use crate::jobs::{JobRegistry, JobSnapshot, JobState};
use crate::pipeline::{DocumentPipeline, PageFanoutEngine, RegistryProgress};
use crate::processor::{PageSource, PdfPageSource};

use super::job::{self, DocumentOutcome, Job, JobOutcome};

/// Builds a page source for one document. Swappable so embedders and
/// tests can substitute rendering.
pub type SourceFactory = Arc<dyn Fn(&Path, u32) -> Arc<dyn PageSource> + Send + Sync>;

pub struct WorkerSupervisor {
    registry: Arc<JobRegistry>,
    db: Database,
    extractor: Arc<dyn PageExtractor>,
    extraction: ExtractionConfig,
    source_factory: SourceFactory,
}

impl WorkerSupervisor {
    pub fn new(
        registry: Arc<JobRegistry>,
        db: Database,
        extractor: Arc<dyn PageExtractor>,
        extraction: ExtractionConfig,
    ) -> Self {
        Self {
            registry,
            db,
            extractor,
            extraction,
            source_factory: Arc::new(|path, dpi| {
                Arc::new(PdfPageSource::new(path.to_path_buf(), dpi))
            }),
        }
    }

    /// Production constructor — wires up the vision client from config.
    pub fn from_config(
        registry: Arc<JobRegistry>,
        db: Database,
        config: &Config,
    ) -> crate::error::Result<Self> {
        let client = VisionClient::from_config(&config.extraction)?;
        Ok(Self::new(
            registry,
            db,
            Arc::new(client),
            config.extraction.clone(),
        ))
    }

    /// Replaces the page-source factory.
    pub fn with_source_factory(mut self, factory: SourceFactory) -> Self {
        self.source_factory = factory;
        self
    }

    /// Submits a batch of documents as one job. Returns the job id
    /// immediately; processing happens in a detached task.
    pub fn submit(&self, documents: Vec<PathBuf>) -> Result<String, WorkerError> {
        job::validate_documents(&documents)?;

        let file_names = documents.iter().map(|p| job::file_name_of(p)).collect();
        let job = Job::new(self.registry.create(file_names), documents);
        let job_id = job.id.clone();

        let registry = Arc::clone(&self.registry);
        let db = self.db.clone();
        let extractor = Arc::clone(&self.extractor);
        let extraction = self.extraction.clone();
        let source_factory = Arc::clone(&self.source_factory);

        let span = info_span!("job", job_id = %job_id);
        tokio::spawn(
            run_job(job, registry, db, extractor, extraction, source_factory).instrument(span),
        );

        Ok(job_id)
    }

    /// Status-poller entry point: typed not-found for unknown ids.
    pub fn poll(&self, job_id: &str) -> Option<JobSnapshot> {
        self.registry.get(job_id)
    }
}

async fn run_job(
    job: Job,
    registry: Arc<JobRegistry>,
    db: Database,
    extractor: Arc<dyn PageExtractor>,
    extraction: ExtractionConfig,
    source_factory: SourceFactory,
) {
    let finalizer = JobFinalizer::new(Arc::clone(&registry), job.id.clone());

    registry.update(&job.id, JobState::Running, "Starting extraction", 0.0);
    info!("processing {} document(s)", job.documents.len());

    let engine = PageFanoutEngine::new(
        extraction.max_concurrent_requests,
        extraction.split_record_pages,
    );
    let pipeline = DocumentPipeline::new(db, extractor, engine);

    let total = job.documents.len();
    let mut outcomes = Vec::with_capacity(total);

    for (doc_index, path) in job.documents.iter().enumerate() {
        let file_name = job::file_name_of(path);
        registry.update(
            &job.id,
            JobState::Running,
            &format!(
                "Processing document {}/{}: {}",
                doc_index + 1,
                total,
                file_name
            ),
            doc_index as f64 / total as f64,
        );

        let progress = RegistryProgress::new(
            Arc::clone(&registry),
            job.id.clone(),
            doc_index,
            total,
        );
        let source = source_factory(path, extraction.render_dpi);

        match pipeline.run(source, &progress).await {
            Ok(report) => {
                info!(
                    "{}: committed {} record(s) from {}/{} page(s)",
                    file_name, report.records_inserted, report.pages_succeeded, report.page_count
                );
                outcomes.push(DocumentOutcome::from_report(&report));
            }
            Err(e) => {
                warn!("{}: document failed — {}", file_name, e);
                outcomes.push(DocumentOutcome::failure(file_name, e.to_string()));
            }
        }
    }

    let outcome = JobOutcome::new(outcomes);
    finalizer.finish(outcome.terminal_state(), &outcome.summary_message());
}

/// Guarantees a terminal registry write. If the job task unwinds before
/// `finish` runs, the drop handler records the failure so the job is
/// never left hanging in `Running`.
struct JobFinalizer {
    registry: Arc<JobRegistry>,
    job_id: String,
    finished: bool,
}

impl JobFinalizer {
    fn new(registry: Arc<JobRegistry>, job_id: String) -> Self {
        Self {
            registry,
            job_id,
            finished: false,
        }
    }

    fn finish(mut self, state: JobState, message: &str) {
        self.registry.update(&self.job_id, state, message, 1.0);
        self.finished = true;
        info!("job finished: {} — {}", state, message);
    }
}

impl Drop for JobFinalizer {
    fn drop(&mut self) {
        if !self.finished {
            warn!("job {} terminated unexpectedly", self.job_id);
            self.registry.update(
                &self.job_id,
                JobState::Failed,
                "Worker terminated unexpectedly",
                1.0,
            );
        }
    }
}
