//! Queue backend for the job worker.
//!
//! This crate defines the boundary between the worker scheduling core and the
//! store that holds queued jobs, worker registrations and failures.
//!
//! # Backends
//!
//! - `MemoryBackend`: in-process storage, used for tests and `mem://`
//! - `RedisBackend`: Resque-compatible key layout in Redis
//!
//! A `BackendConfig` is resolved once at startup into an
//! `Arc<dyn QueueBackend>` shared by every worker.

mod config;
mod error;
mod memory;
mod process;
mod resque;

use std::future::Future;
use std::pin::Pin;

use queue_core::{Job, QueueSet, WorkerId};

pub use config::{BackendConfig, RedisConfig};
pub use error::BackendError;
pub use memory::{BackendStats, MemoryBackend};
pub use process::is_running;
pub use resque::{RedisBackend, RedisKeys};

/// Future type returned by backend operations.
pub type BackendFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BackendError>> + Send + 'a>>;

/// Operations the worker loop needs from the queue store.
///
/// Reservation must be atomic: two workers never receive the same job.
pub trait QueueBackend: Send + Sync + 'static {
    /// Push a job onto its queue.
    fn enqueue(&self, job: Job) -> BackendFuture<'_, ()>;

    /// Claim the next job from the first queue in `queues` that has one.
    fn reserve<'a>(&'a self, queues: &'a QueueSet) -> BackendFuture<'a, Option<Job>>;

    /// Add a worker to the registry.
    fn register_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()>;

    /// Remove a worker and its per-worker stats from the registry.
    fn deregister_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()>;

    /// Deregister workers of this host whose process no longer exists.
    fn prune_dead_workers(&self) -> BackendFuture<'_, Vec<WorkerId>>;

    /// Record that `worker` started processing `job`.
    fn mark_working<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()>;

    /// Clear the working record of `worker` and count the job as processed.
    fn mark_done<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()>;

    /// Append a failure record for `job`.
    fn record_failure<'a>(
        &'a self,
        worker: &'a WorkerId,
        job: &'a Job,
        error: &'a str,
    ) -> BackendFuture<'a, ()>;
}

/// Whether a registered worker id points at a process that has gone away.
pub(crate) fn is_dead_local_worker(worker: &WorkerId) -> bool {
    worker.is_local() && worker.pid() != std::process::id() && !is_running(worker.pid())
}
