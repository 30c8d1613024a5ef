pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod jobs;
pub mod pipeline;
pub mod processor;
pub mod worker;

pub use config::{load_config, Config, ExtractionConfig};
pub use db::{default_database_path, Database, DatabaseError};
pub use error::{ConfigError, ProcessError, Result, RollscanError, WorkerError};
pub use extract::{ExtractError, PageExtractor, PageKind, PagePayload, VisionClient};
pub use jobs::{JobRegistry, JobSnapshot, JobState};
pub use pipeline::{
    DocumentPipeline, NoopProgress, PageFanoutEngine, PipelineError, ProgressEvent,
    ProgressReporter,
};
pub use processor::{PageImage, PageSource, PdfPageSource};
pub use worker::WorkerSupervisor;
