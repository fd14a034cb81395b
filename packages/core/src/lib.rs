//! Core domain types for the job worker.
//!
//! This crate contains shared types used across all packages:
//! - Job and Payload for units of work
//! - QueueSet for the queues a worker polls
//! - WorkerId for registry bookkeeping
//! - Failure records and worker events for observability

mod error;
mod events;
mod failure;
mod job;
mod queue;
mod worker;

pub use error::CoreError;
pub use events::WorkerEvent;
pub use failure::Failure;
pub use job::{Job, Payload};
pub use queue::{QueueSet, WILDCARD};
pub use worker::{WorkerId, local_hostname, system_hostname};
