use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RollscanError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Extraction error: {0}")]
    Extract(#[from] crate::extract::ExtractError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] crate::pipeline::PipelineError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Failed to read document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to process PDF: {0}")]
    PdfProcessing(String),

    #[error("Failed to process page image: {0}")]
    ImageProcessing(String),

    #[error("Document has no extractable pages: {0}")]
    EmptyDocument(PathBuf),
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Job contains no documents")]
    NoDocuments,

    #[error("Unsupported document type: {path} ({mime})")]
    UnsupportedDocument { path: PathBuf, mime: String },

    #[error("Job failed: {0}")]
    JobFailed(String),
}

pub type Result<T> = std::result::Result<T, RollscanError>;
