use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::jobs::{JobRegistry, JobState};

/// Events emitted by the pipeline while a document is processed.
pub enum ProgressEvent {
    Phase {
        message: String,
    },
    /// A page finished (successfully or not).
    PagesDone {
        label: String,
        completed: usize,
        total: usize,
    },
    DocumentCompleted {
        label: String,
        pages_succeeded: usize,
        page_count: usize,
        records_inserted: usize,
    },
    DocumentFailed {
        label: String,
        error: String,
    },
}

/// The narrow seam the engine and runner report through. Implementations
/// must never let a reporting failure propagate back into extraction.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges pipeline events into the shared job registry, scaling one
/// document's progress into the whole job's fraction.
pub struct RegistryProgress {
    registry: Arc<JobRegistry>,
    job_id: String,
    doc_index: usize,
    doc_count: usize,
    /// Bit pattern of the last per-document fraction, so phase messages
    /// never move the bar backwards.
    last_doc_fraction: AtomicU64,
}

impl RegistryProgress {
    pub fn new(
        registry: Arc<JobRegistry>,
        job_id: String,
        doc_index: usize,
        doc_count: usize,
    ) -> Self {
        Self {
            registry,
            job_id,
            doc_index,
            doc_count: doc_count.max(1),
            last_doc_fraction: AtomicU64::new(0f64.to_bits()),
        }
    }

    fn job_fraction(&self, doc_fraction: f64) -> f64 {
        (self.doc_index as f64 + doc_fraction.clamp(0.0, 1.0)) / self.doc_count as f64
    }

    fn remember(&self, doc_fraction: f64) -> f64 {
        self.last_doc_fraction
            .store(doc_fraction.to_bits(), Ordering::Relaxed);
        doc_fraction
    }

    fn recall(&self) -> f64 {
        f64::from_bits(self.last_doc_fraction.load(Ordering::Relaxed))
    }
}

impl ProgressReporter for RegistryProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Phase { message } => {
                let fraction = self.job_fraction(self.recall());
                self.registry
                    .update(&self.job_id, JobState::Running, &message, fraction);
            }
            ProgressEvent::PagesDone {
                label,
                completed,
                total,
            } => {
                let doc_fraction = if total == 0 {
                    1.0
                } else {
                    completed as f64 / total as f64
                };
                let fraction = self.job_fraction(self.remember(doc_fraction));
                let message = format!("Extracting {}: page {}/{}", label, completed, total);
                self.registry
                    .update(&self.job_id, JobState::Running, &message, fraction);
            }
            ProgressEvent::DocumentCompleted {
                label,
                pages_succeeded,
                page_count,
                records_inserted,
            } => {
                let fraction = self.job_fraction(self.remember(1.0));
                let message = format!(
                    "Finished {} ({}/{} pages, {} records)",
                    label, pages_succeeded, page_count, records_inserted
                );
                self.registry
                    .update(&self.job_id, JobState::Running, &message, fraction);
            }
            ProgressEvent::DocumentFailed { label, error } => {
                let fraction = self.job_fraction(self.remember(1.0));
                let message = format!("{} failed: {}", label, error);
                self.registry
                    .update(&self.job_id, JobState::Running, &message, fraction);
            }
        }
    }
}
