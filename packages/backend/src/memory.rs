//! In-process queue backend.

use std::collections::{BTreeMap, HashMap, VecDeque};

use queue_core::{Failure, Job, Payload, QueueSet, WorkerId};
use tokio::sync::Mutex;

use crate::{BackendFuture, QueueBackend, is_dead_local_worker};

/// Processed and failed counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Jobs that finished, successfully or not.
    pub processed: u64,
    /// Jobs that ended up in the failure list.
    pub failed: u64,
    /// Processed jobs per queue name.
    pub processed_by_queue: HashMap<String, u64>,
    /// Processed jobs per registered worker.
    pub processed_by_worker: HashMap<String, u64>,
    /// Failed jobs per registered worker.
    pub failed_by_worker: HashMap<String, u64>,
}

#[derive(Debug, Default)]
struct MemoryState {
    queues: BTreeMap<String, VecDeque<Payload>>,
    /// Registered workers and the job each is marked as working on.
    workers: HashMap<WorkerId, Option<Job>>,
    failures: Vec<Failure>,
    stats: BackendStats,
}

impl MemoryState {
    fn fail(&mut self, failure: Failure) {
        self.stats.failed += 1;
        *self
            .stats
            .failed_by_worker
            .entry(failure.worker.clone())
            .or_default() += 1;
        self.failures.push(failure);
    }

    fn deregister(&mut self, worker: &WorkerId) {
        if let Some(Some(job)) = self.workers.remove(worker) {
            self.fail(Failure::dirty_exit(worker, &job));
        }
        let key = worker.to_string();
        self.stats.processed_by_worker.remove(&key);
        self.stats.failed_by_worker.remove(&key);
    }
}

/// Queue backend that keeps everything in memory.
///
/// State lives as long as the value; share it with `Arc` to inspect what the
/// workers did.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs waiting in a queue.
    pub async fn len(&self, queue: &str) -> usize {
        self.state
            .lock()
            .await
            .queues
            .get(queue)
            .map_or(0, VecDeque::len)
    }

    /// Names of every queue that has been pushed to.
    pub async fn queues(&self) -> Vec<String> {
        self.state.lock().await.queues.keys().cloned().collect()
    }

    /// Snapshot of the counters.
    pub async fn stats(&self) -> BackendStats {
        self.state.lock().await.stats.clone()
    }

    /// Snapshot of the failure list.
    pub async fn failures(&self) -> Vec<Failure> {
        self.state.lock().await.failures.clone()
    }

    /// Registered workers.
    pub async fn workers(&self) -> Vec<WorkerId> {
        self.state.lock().await.workers.keys().cloned().collect()
    }

    /// The job a worker is currently marked as working on.
    pub async fn working_on(&self, worker: &WorkerId) -> Option<Job> {
        self.state
            .lock()
            .await
            .workers
            .get(worker)
            .and_then(Clone::clone)
    }
}

impl QueueBackend for MemoryBackend {
    fn enqueue(&self, job: Job) -> BackendFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state
                .queues
                .entry(job.queue)
                .or_default()
                .push_back(job.payload);
            Ok(())
        })
    }

    fn reserve<'a>(&'a self, queues: &'a QueueSet) -> BackendFuture<'a, Option<Job>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let names = queues.resolve(state.queues.keys().cloned());

            for name in names {
                if let Some(payload) = state.queues.get_mut(&name).and_then(VecDeque::pop_front) {
                    return Ok(Some(Job {
                        queue: name,
                        payload,
                    }));
                }
            }
            Ok(None)
        })
    }

    fn register_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.workers.insert(worker.clone(), None);
            Ok(())
        })
    }

    fn deregister_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.state.lock().await.deregister(worker);
            Ok(())
        })
    }

    fn prune_dead_workers(&self) -> BackendFuture<'_, Vec<WorkerId>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let dead: Vec<WorkerId> = state
                .workers
                .keys()
                .filter(|w| is_dead_local_worker(w))
                .cloned()
                .collect();

            for worker in &dead {
                tracing::info!("Pruning dead worker: {}", worker);
                state.deregister(worker);
            }
            Ok(dead)
        })
    }

    fn mark_working<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.workers.insert(worker.clone(), Some(job.clone()));
            Ok(())
        })
    }

    fn mark_done<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if let Some(working_on) = state.workers.get_mut(worker) {
                *working_on = None;
            }

            let stats = &mut state.stats;
            stats.processed += 1;
            *stats
                .processed_by_queue
                .entry(job.queue.clone())
                .or_default() += 1;
            *stats
                .processed_by_worker
                .entry(worker.to_string())
                .or_default() += 1;
            Ok(())
        })
    }

    fn record_failure<'a>(
        &'a self,
        worker: &'a WorkerId,
        job: &'a Job,
        error: &'a str,
    ) -> BackendFuture<'a, ()> {
        Box::pin(async move {
            self.state
                .lock()
                .await
                .fail(Failure::new(worker, job, error));
            Ok(())
        })
    }
}
