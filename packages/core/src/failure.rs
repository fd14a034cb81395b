//! Failure records kept by the backend for jobs that raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Job, Payload, WorkerId};

/// Exception name recorded for ordinary job errors.
const JOB_ERROR: &str = "JobError";

/// Exception name recorded when a worker goes away mid-job.
const DIRTY_EXIT: &str = "DirtyExit";

/// A failed job as stored in the failure list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Failure {
    pub failed_at: DateTime<Utc>,
    pub payload: Payload,
    pub exception: String,
    pub error: String,
    #[serde(default)]
    pub backtrace: Vec<String>,
    pub worker: String,
    pub queue: String,
}

impl Failure {
    /// Record a job that returned an error.
    pub fn new(worker: &WorkerId, job: &Job, error: impl Into<String>) -> Self {
        Self::with_exception(worker, job, JOB_ERROR, error)
    }

    /// Record a job abandoned because its worker deregistered while working.
    pub fn dirty_exit(worker: &WorkerId, job: &Job) -> Self {
        Self::with_exception(worker, job, DIRTY_EXIT, "Worker exited while processing the job")
    }

    fn with_exception(
        worker: &WorkerId,
        job: &Job,
        exception: &str,
        error: impl Into<String>,
    ) -> Self {
        Self {
            failed_at: Utc::now(),
            payload: job.payload.clone(),
            exception: exception.to_string(),
            error: error.into(),
            backtrace: Vec::new(),
            worker: worker.to_string(),
            queue: job.queue.clone(),
        }
    }

    /// Whether this failure came from a worker exiting mid-job.
    pub fn is_dirty_exit(&self) -> bool {
        self.exception == DIRTY_EXIT
    }
}
