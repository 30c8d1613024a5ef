pub mod context;
pub mod engine;
pub mod error;
pub mod progress;
pub mod runner;

pub use context::DocumentContext;
pub use engine::{DocumentResult, PageFailure, PageFanoutEngine, PageOutcome};
pub use error::PipelineError;
pub use progress::{NoopProgress, ProgressEvent, ProgressReporter, RegistryProgress};
pub use runner::{DocumentPipeline, DocumentReport};
