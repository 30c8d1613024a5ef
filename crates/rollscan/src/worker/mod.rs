pub mod job;
pub mod supervisor;

pub use job::{DocumentOutcome, Job, JobOutcome};
pub use supervisor::{SourceFactory, WorkerSupervisor};
