use std::path::{Path, PathBuf};

use crate::error::WorkerError;
use crate::jobs::JobState;
use crate::pipeline::DocumentReport;

/// One submitted batch of documents.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub documents: Vec<PathBuf>,
}

impl Job {
    pub fn new(id: String, documents: Vec<PathBuf>) -> Self {
        Self { id, documents }
    }

    pub fn file_names(&self) -> Vec<String> {
        self.documents.iter().map(|p| file_name_of(p)).collect()
    }
}

/// Rejects empty submissions and anything that is not a PDF.
pub fn validate_documents(documents: &[PathBuf]) -> Result<(), WorkerError> {
    if documents.is_empty() {
        return Err(WorkerError::NoDocuments);
    }
    for path in documents {
        let mime = mime_guess::from_path(path)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        if mime != "application/pdf" {
            return Err(WorkerError::UnsupportedDocument {
                path: path.clone(),
                mime,
            });
        }
    }
    Ok(())
}

pub fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document.pdf")
        .to_string()
}

/// How one document in a job ended.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub file_name: String,
    pub success: bool,
    pub page_count: usize,
    pub pages_succeeded: usize,
    pub records_inserted: usize,
    pub error: Option<String>,
}

impl DocumentOutcome {
    pub fn from_report(report: &DocumentReport) -> Self {
        Self {
            file_name: report.file_name.clone(),
            success: true,
            page_count: report.page_count,
            pages_succeeded: report.pages_succeeded,
            records_inserted: report.records_inserted,
            error: None,
        }
    }

    pub fn failure(file_name: String, error: String) -> Self {
        Self {
            file_name,
            success: false,
            page_count: 0,
            pages_succeeded: 0,
            records_inserted: 0,
            error: Some(error),
        }
    }
}

/// Aggregated end state of a job.
#[derive(Debug)]
pub struct JobOutcome {
    pub documents: Vec<DocumentOutcome>,
}

impl JobOutcome {
    pub fn new(documents: Vec<DocumentOutcome>) -> Self {
        Self { documents }
    }

    fn succeeded(&self) -> usize {
        self.documents.iter().filter(|d| d.success).count()
    }

    /// `Complete` when every document committed, `Failed` when none did,
    /// `PartialFailure` otherwise. Page-level failures never demote the
    /// state — they only show up in the message.
    pub fn terminal_state(&self) -> JobState {
        let succeeded = self.succeeded();
        if succeeded == self.documents.len() {
            JobState::Complete
        } else if succeeded == 0 {
            JobState::Failed
        } else {
            JobState::PartialFailure
        }
    }

    pub fn summary_message(&self) -> String {
        let total = self.documents.len();
        let succeeded = self.succeeded();
        let pages_total: usize = self.documents.iter().map(|d| d.page_count).sum();
        let pages_ok: usize = self.documents.iter().map(|d| d.pages_succeeded).sum();
        let first_error = self
            .documents
            .iter()
            .find_map(|d| d.error.as_deref())
            .unwrap_or("unknown error");

        match self.terminal_state() {
            JobState::Complete => format!(
                "Successfully processed {} document(s); {}/{} page(s) succeeded",
                total, pages_ok, pages_total
            ),
            JobState::PartialFailure => format!(
                "{}/{} document(s) succeeded; first failure: {}",
                succeeded, total, first_error
            ),
            _ => format!("All {} document(s) failed: {}", total, first_error),
        }
    }
}
