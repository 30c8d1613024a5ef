//! In-memory job registry.
//!
//! The single resource shared between the request-serving path (status
//! pollers) and the worker tasks. All state lives behind one `RwLock`,
//! held only long enough to copy or mutate an entry — no I/O or
//! extraction work ever happens under the lock. Jobs are not persisted;
//! a process restart empties the registry.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use super::status::{JobSnapshot, JobState};

pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobSnapshot>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Creates a new queued job for the given document file names and
    /// returns its id.
    pub fn create(&self, documents: Vec<String>) -> String {
        let job_id = uuid::Uuid::new_v4().to_string();
        let snapshot = JobSnapshot::new(job_id.clone(), documents);

        let mut jobs = match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        jobs.insert(job_id.clone(), snapshot);
        job_id
    }

    /// Updates a job's state, message, and progress.
    ///
    /// Updates against a job already in a terminal state are dropped: the
    /// state machine never emits a transition out of a terminal state.
    /// Unknown ids are logged and ignored.
    pub fn update(&self, job_id: &str, state: JobState, message: &str, progress: f64) {
        let mut jobs = match self.jobs.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };

        match jobs.get_mut(job_id) {
            Some(job) => {
                if job.state.is_terminal() {
                    log::warn!(
                        "Ignoring update to terminal job {} ({} -> {})",
                        job_id,
                        job.state,
                        state
                    );
                    return;
                }
                job.state = state;
                job.message = message.to_string();
                job.progress = progress.clamp(0.0, 1.0);
                job.updated_at = Utc::now();
            }
            None => {
                log::warn!("Ignoring update to unknown job {}", job_id);
            }
        }
    }

    /// Returns a snapshot of a job, or `None` for an unknown id. Callers
    /// translate the miss into a not-found response.
    pub fn get(&self, job_id: &str) -> Option<JobSnapshot> {
        let jobs = match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        jobs.get(job_id).cloned()
    }

    /// Returns all jobs, newest first.
    pub fn get_all(&self) -> Vec<JobSnapshot> {
        let jobs = match self.jobs.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("Job registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        };
        let mut result: Vec<JobSnapshot> = jobs.values().cloned().collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}
