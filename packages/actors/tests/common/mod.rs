#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actors::{FnHandler, HandlerFuture, Job, JobHandlerRegistry, WorkerEvent, suspend};
use backend::{BackendError, BackendFuture, MemoryBackend, QueueBackend};
use queue_core::{QueueSet, WorkerId};
use serde_json::json;
use tokio::sync::broadcast;

/// A backend call as seen by the recording wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Register,
    Deregister,
    Prune,
    Reserve,
    MarkWorking(String),
    MarkDone(String),
    RecordFailure(String, String),
}

/// Memory backend that logs every call a worker makes.
#[derive(Default)]
pub struct RecordingBackend {
    pub inner: MemoryBackend,
    calls: Mutex<Vec<Call>>,
    fail_reserve: AtomicBool,
}

impl RecordingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing_reserve() -> Arc<Self> {
        let backend = Self::default();
        backend.fail_reserve.store(true, Ordering::SeqCst);
        Arc::new(backend)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.calls().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl QueueBackend for RecordingBackend {
    fn enqueue(&self, job: Job) -> BackendFuture<'_, ()> {
        self.inner.enqueue(job)
    }

    fn reserve<'a>(&'a self, queues: &'a QueueSet) -> BackendFuture<'a, Option<Job>> {
        self.record(Call::Reserve);
        if self.fail_reserve.load(Ordering::SeqCst) {
            return Box::pin(async {
                Err(BackendError::Redis(redis::RedisError::from((
                    redis::ErrorKind::IoError,
                    "connection refused",
                ))))
            });
        }
        self.inner.reserve(queues)
    }

    fn register_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        self.record(Call::Register);
        self.inner.register_worker(worker)
    }

    fn deregister_worker<'a>(&'a self, worker: &'a WorkerId) -> BackendFuture<'a, ()> {
        self.record(Call::Deregister);
        self.inner.deregister_worker(worker)
    }

    fn prune_dead_workers(&self) -> BackendFuture<'_, Vec<WorkerId>> {
        self.record(Call::Prune);
        self.inner.prune_dead_workers()
    }

    fn mark_working<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        self.record(Call::MarkWorking(job.class().to_string()));
        self.inner.mark_working(worker, job)
    }

    fn mark_done<'a>(&'a self, worker: &'a WorkerId, job: &'a Job) -> BackendFuture<'a, ()> {
        self.record(Call::MarkDone(job.class().to_string()));
        self.inner.mark_done(worker, job)
    }

    fn record_failure<'a>(
        &'a self,
        worker: &'a WorkerId,
        job: &'a Job,
        error: &'a str,
    ) -> BackendFuture<'a, ()> {
        self.record(Call::RecordFailure(
            job.class().to_string(),
            error.to_string(),
        ));
        self.inner.record_failure(worker, job, error)
    }
}

/// Handlers used across tests:
/// - `Succeed` returns `Ok`
/// - `Fail` returns `Err("boom")`
/// - `Slow` suspends for `args[0]` milliseconds, then succeeds
pub fn handlers() -> JobHandlerRegistry {
    let mut handlers = JobHandlerRegistry::new();
    handlers.register(FnHandler::new("Succeed", |_job: &Job| -> HandlerFuture {
        Box::pin(async { Ok(()) })
    }));
    handlers.register(FnHandler::new("Fail", |_job: &Job| -> HandlerFuture {
        Box::pin(async { Err("boom".to_string()) })
    }));
    handlers.register(FnHandler::new("Slow", |job: &Job| -> HandlerFuture {
        let millis = job.args().first().and_then(|v| v.as_u64()).unwrap_or(0);
        Box::pin(async move {
            suspend::suspend(Duration::from_millis(millis)).await;
            Ok(())
        })
    }));
    handlers
}

pub fn job(class: &str) -> Job {
    Job::new("jobs", class, vec![])
}

pub fn slow_job(millis: u64) -> Job {
    Job::new("jobs", "Slow", vec![json!(millis)])
}

pub fn jobs_queue() -> QueueSet {
    QueueSet::parse("jobs").unwrap()
}

/// Drain whatever events are buffered.
pub fn drain(rx: &mut broadcast::Receiver<WorkerEvent>) -> Vec<WorkerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wait for the first event matching `pred`.
pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<WorkerEvent>, pred: F) -> WorkerEvent
where
    F: Fn(&WorkerEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = rx.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event arrives")
}
