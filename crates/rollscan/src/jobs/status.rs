//! Job state machine types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a job: `Queued → Running → (Complete | PartialFailure | Failed)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    /// Every document committed; individual page failures are reflected in
    /// the message, not in the state.
    Complete,
    /// At least one document failed entirely, at least one succeeded.
    PartialFailure,
    /// Every document failed, or the worker hit a fault outside the
    /// per-document isolation boundary.
    Failed,
}

impl JobState {
    /// Terminal states accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Complete | JobState::PartialFailure | JobState::Failed
        )
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "Queued"),
            JobState::Running => write!(f, "Running"),
            JobState::Complete => write!(f, "Complete"),
            JobState::PartialFailure => write!(f, "Partial failure"),
            JobState::Failed => write!(f, "Failed"),
        }
    }
}

/// Point-in-time view of a job, as returned to status pollers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    /// Unique job identifier.
    pub job_id: String,
    /// Current state.
    pub state: JobState,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Overall progress in [0.0, 1.0].
    pub progress: f64,
    /// File names of the documents in this job.
    pub documents: Vec<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the job was last updated.
    pub updated_at: DateTime<Utc>,
}

impl JobSnapshot {
    pub fn new(job_id: String, documents: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            state: JobState::Queued,
            message: "Documents queued for processing".to_string(),
            progress: 0.0,
            documents,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}
