//! Job domain types for units of work pulled from a queue.

use serde::{Deserialize, Serialize};

/// Serialized description of the work to perform.
///
/// The wire shape is `{"class": "...", "args": [...]}` so payloads written by
/// other Resque producers can be reserved unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    /// Handler class used to route the job.
    pub class: String,
    /// Positional arguments for the handler.
    #[serde(default)]
    pub args: Vec<serde_json::Value>,
}

impl Payload {
    pub fn new(class: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            class: class.into(),
            args,
        }
    }
}

/// A job reserved from (or destined for) a named queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// The queue this job belongs to.
    pub queue: String,
    /// What to run.
    pub payload: Payload,
}

impl Job {
    /// Create a new job for the given queue.
    pub fn new(
        queue: impl Into<String>,
        class: impl Into<String>,
        args: Vec<serde_json::Value>,
    ) -> Self {
        Self {
            queue: queue.into(),
            payload: Payload::new(class, args),
        }
    }

    /// The handler class of this job.
    pub fn class(&self) -> &str {
        &self.payload.class
    }

    /// The job arguments.
    pub fn args(&self) -> &[serde_json::Value] {
        &self.payload.args
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({} job, class: {})", self.queue, self.payload.class)
    }
}
