use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Document processing failed: {0}")]
    Processing(#[from] crate::error::ProcessError),

    #[error("All {total} page(s) failed extraction; first cause: {first_cause}")]
    AllPagesFailed { total: usize, first_cause: String },

    #[error("Header page did not yield roll metadata")]
    MissingHeader,

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Page render task failed: {0}")]
    RenderTask(String),
}
