//! Event types for observing worker activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Events emitted by workers as they move through their loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkerEvent {
    /// A worker registered itself and entered its loop.
    WorkerStarted {
        worker_id: String,
        queues: String,
        timestamp: DateTime<Utc>,
    },
    /// A job was reserved and is about to run.
    JobStarted {
        worker_id: String,
        queue: String,
        class: String,
        timestamp: DateTime<Utc>,
    },
    /// A job ran to completion.
    JobCompleted {
        worker_id: String,
        queue: String,
        class: String,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// A job returned an error (or panicked) and was handed to the failure list.
    JobFailed {
        worker_id: String,
        queue: String,
        class: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
    /// A worker found nothing to do and is waiting before polling again.
    WorkerSuspended {
        worker_id: String,
        interval_ms: u64,
        paused: bool,
        timestamp: DateTime<Utc>,
    },
    /// A worker left its loop and deregistered.
    WorkerStopped {
        worker_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl WorkerEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            WorkerEvent::WorkerStarted { timestamp, .. } => *timestamp,
            WorkerEvent::JobStarted { timestamp, .. } => *timestamp,
            WorkerEvent::JobCompleted { timestamp, .. } => *timestamp,
            WorkerEvent::JobFailed { timestamp, .. } => *timestamp,
            WorkerEvent::WorkerSuspended { timestamp, .. } => *timestamp,
            WorkerEvent::WorkerStopped { timestamp, .. } => *timestamp,
        }
    }

    /// Get the id of the worker that emitted this event.
    pub fn worker_id(&self) -> &str {
        match self {
            WorkerEvent::WorkerStarted { worker_id, .. }
            | WorkerEvent::JobStarted { worker_id, .. }
            | WorkerEvent::JobCompleted { worker_id, .. }
            | WorkerEvent::JobFailed { worker_id, .. }
            | WorkerEvent::WorkerSuspended { worker_id, .. }
            | WorkerEvent::WorkerStopped { worker_id, .. } => worker_id,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            WorkerEvent::WorkerStarted {
                worker_id, queues, ..
            } => format!("Worker {} polling {}", worker_id, queues),
            WorkerEvent::JobStarted {
                worker_id,
                queue,
                class,
                ..
            } => format!("Worker {} running {} from {}", worker_id, class, queue),
            WorkerEvent::JobCompleted {
                class, duration_ms, ..
            } => format!("Job {} completed in {}ms", class, duration_ms),
            WorkerEvent::JobFailed { class, error, .. } => {
                format!("Job {} failed: {}", class, error)
            }
            WorkerEvent::WorkerSuspended {
                worker_id,
                interval_ms,
                paused,
                ..
            } => {
                let why = if *paused { "paused" } else { "idle" };
                format!("Worker {} {} for {}ms", worker_id, why, interval_ms)
            }
            WorkerEvent::WorkerStopped {
                worker_id, reason, ..
            } => format!("Worker {} stopped: {}", worker_id, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let event = WorkerEvent::WorkerStopped {
            worker_id: "box:1:jobs".into(),
            reason: "shutdown".into(),
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "worker_stopped");
        assert_eq!(event.worker_id(), "box:1:jobs");
        assert_eq!(event.description(), "Worker box:1:jobs stopped: shutdown");
    }
}
