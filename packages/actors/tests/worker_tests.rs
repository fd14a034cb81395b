#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use actors::{JobHandlerRegistry, Worker, WorkerControl, WorkerEvent, WorkerState, WorkerTask};
use backend::{BackendError, QueueBackend};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use common::{Call, RecordingBackend, handlers, job, jobs_queue, slow_job};

struct Harness {
    task: WorkerTask,
    handle: JoinHandle<()>,
    events: broadcast::Receiver<WorkerEvent>,
}

async fn run_worker(
    backend: Arc<RecordingBackend>,
    interval: Duration,
    control: &WorkerControl,
    handlers: JobHandlerRegistry,
) -> Harness {
    let (tx, events) = broadcast::channel(1024);
    let mut task = WorkerTask::new(Worker::new(jobs_queue(), interval, control.clone()));
    let handle = task
        .resume(backend, Arc::new(handlers), tx)
        .await
        .expect("worker spawns");
    Harness {
        task,
        handle,
        events,
    }
}

async fn join(handle: JoinHandle<()>) {
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("worker stops")
        .expect("worker task");
}

#[tokio::test]
async fn zero_interval_without_jobs_stops_without_suspending() {
    let backend = RecordingBackend::new();
    let control = WorkerControl::new();
    let mut h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    tokio::time::timeout(Duration::from_secs(5), h.task.worker().stopped())
        .await
        .expect("worker reaches Stopped");
    join(h.handle).await;

    assert_eq!(
        backend.calls(),
        vec![Call::Register, Call::Reserve, Call::Deregister]
    );
    assert!(!h.task.is_alive());

    let events = common::drain(&mut h.events);
    assert!(matches!(events.first(), Some(WorkerEvent::WorkerStarted { .. })));
    assert!(matches!(
        events.last(),
        Some(WorkerEvent::WorkerStopped { reason, .. }) if reason == "queues drained"
    ));
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, WorkerEvent::WorkerSuspended { .. }))
    );
}

#[tokio::test]
async fn job_is_marked_working_before_and_done_after() -> Result<(), BackendError> {
    let backend = RecordingBackend::new();
    backend.enqueue(job("Succeed")).await?;
    let control = WorkerControl::new();
    let mut h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    join(h.handle).await;

    assert_eq!(
        backend.calls(),
        vec![
            Call::Register,
            Call::Reserve,
            Call::MarkWorking("Succeed".into()),
            Call::MarkDone("Succeed".into()),
            Call::Reserve,
            Call::Deregister,
        ]
    );
    assert_eq!(backend.inner.stats().await.processed, 1);
    assert!(backend.inner.failures().await.is_empty());

    let events = common::drain(&mut h.events);
    assert!(events.iter().any(|e| matches!(
        e,
        WorkerEvent::JobCompleted { class, queue, .. } if class == "Succeed" && queue == "jobs"
    )));
    Ok(())
}

#[tokio::test]
async fn failing_job_is_recorded_once_and_the_loop_continues() -> Result<(), BackendError> {
    let backend = RecordingBackend::new();
    backend.enqueue(job("Fail")).await?;
    backend.enqueue(job("Succeed")).await?;
    let control = WorkerControl::new();
    let h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    join(h.handle).await;

    assert_eq!(
        backend.calls(),
        vec![
            Call::Register,
            Call::Reserve,
            Call::MarkWorking("Fail".into()),
            Call::RecordFailure("Fail".into(), "boom".into()),
            Call::MarkDone("Fail".into()),
            Call::Reserve,
            Call::MarkWorking("Succeed".into()),
            Call::MarkDone("Succeed".into()),
            Call::Reserve,
            Call::Deregister,
        ]
    );

    let failures = backend.inner.failures().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, "boom");
    assert_eq!(failures[0].payload.class, "Fail");
    assert_eq!(backend.inner.stats().await.processed, 2);
    assert_eq!(h.task.worker().state(), WorkerState::Stopped);
    Ok(())
}

#[tokio::test]
async fn unknown_class_is_a_failure_not_a_crash() -> Result<(), BackendError> {
    let backend = RecordingBackend::new();
    backend.enqueue(job("Missing")).await?;
    let control = WorkerControl::new();
    let h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    join(h.handle).await;

    let failures = backend.inner.failures().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, "No handler for job class: Missing");
    assert_eq!(backend.count(&Call::Deregister), 1);
    Ok(())
}

#[tokio::test]
async fn shutdown_during_execution_finishes_the_job_first() -> Result<(), BackendError> {
    let backend = RecordingBackend::new();
    backend.enqueue(slow_job(50)).await?;
    backend.enqueue(job("Succeed")).await?;
    let control = WorkerControl::new();
    let mut h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    common::wait_for_event(&mut h.events, |e| {
        matches!(e, WorkerEvent::JobStarted { class, .. } if class == "Slow")
    })
    .await;
    assert_eq!(h.task.worker().state(), WorkerState::Executing);
    h.task.request_shutdown();

    join(h.handle).await;

    // The slow job ran to completion; the second job was never reserved.
    let stats = backend.inner.stats().await;
    assert_eq!(stats.processed, 1);
    assert!(backend.inner.failures().await.is_empty());
    assert_eq!(backend.inner.len("jobs").await, 1);
    assert_eq!(
        backend.calls().last(),
        Some(&Call::Deregister),
        "deregistered after the job finished"
    );
    assert_eq!(backend.count(&Call::MarkDone("Slow".into())), 1);
    Ok(())
}

#[tokio::test]
async fn suspended_worker_wakes_on_shutdown() {
    let backend = RecordingBackend::new();
    let control = WorkerControl::new();
    let mut h = run_worker(backend.clone(), Duration::from_secs(60), &control, handlers()).await;

    let suspended = common::wait_for_event(&mut h.events, |e| {
        matches!(e, WorkerEvent::WorkerSuspended { .. })
    })
    .await;
    assert!(matches!(
        suspended,
        WorkerEvent::WorkerSuspended { interval_ms: 60_000, paused: false, .. }
    ));
    assert_eq!(h.task.worker().state(), WorkerState::Suspended);

    control.request_shutdown();
    join(h.handle).await;

    assert_eq!(backend.count(&Call::Reserve), 1);
    assert_eq!(h.task.worker().state(), WorkerState::Stopped);
}

#[tokio::test]
async fn paused_worker_suspends_without_reserving() -> Result<(), BackendError> {
    let backend = RecordingBackend::new();
    backend.enqueue(job("Succeed")).await?;
    let control = WorkerControl::new();
    control.pause();
    let mut h = run_worker(
        backend.clone(),
        Duration::from_millis(10),
        &control,
        handlers(),
    )
    .await;

    common::wait_for_event(&mut h.events, |e| {
        matches!(e, WorkerEvent::WorkerSuspended { paused: true, .. })
    })
    .await;
    assert_eq!(backend.count(&Call::Reserve), 0);
    assert_eq!(backend.inner.len("jobs").await, 1);

    control.resume();
    common::wait_for_event(&mut h.events, |e| {
        matches!(e, WorkerEvent::JobCompleted { .. })
    })
    .await;

    control.request_shutdown();
    join(h.handle).await;
    assert_eq!(backend.inner.stats().await.processed, 1);
    Ok(())
}

#[tokio::test]
async fn paused_worker_with_zero_interval_stops() {
    let backend = RecordingBackend::new();
    let control = WorkerControl::new();
    control.pause();
    let h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    join(h.handle).await;
    assert_eq!(backend.calls(), vec![Call::Register, Call::Deregister]);
}

#[tokio::test]
async fn backend_error_stops_only_the_affected_worker() {
    let broken = RecordingBackend::failing_reserve();
    let healthy = RecordingBackend::new();
    let control = WorkerControl::new();

    let a = run_worker(broken.clone(), Duration::from_millis(10), &control, handlers()).await;
    let mut b = run_worker(healthy.clone(), Duration::from_millis(10), &control, handlers()).await;

    join(a.handle).await;
    assert!(!a.task.is_alive());
    assert_eq!(a.task.worker().state(), WorkerState::Stopped);
    assert_eq!(
        broken.calls(),
        vec![Call::Register, Call::Reserve, Call::Deregister]
    );
    assert!(broken.inner.workers().await.is_empty());

    // The other worker keeps polling.
    common::wait_for_event(&mut b.events, |e| {
        matches!(e, WorkerEvent::WorkerSuspended { .. })
    })
    .await;
    assert!(b.task.is_alive());

    control.request_shutdown();
    join(b.handle).await;
    assert!(!b.task.is_alive());
}

#[tokio::test]
async fn a_task_can_only_be_resumed_once() {
    let backend = RecordingBackend::new();
    let control = WorkerControl::new();
    let mut h = run_worker(backend.clone(), Duration::ZERO, &control, handlers()).await;

    let (tx, _rx) = broadcast::channel(16);
    let again = h
        .task
        .resume(backend.clone(), Arc::new(handlers()), tx)
        .await;
    assert!(matches!(again, Err(actors::MachineError::AlreadyStarted(_))));

    join(h.handle).await;
}
