//! Workers and the tasks that run them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use backend::QueueBackend;
use queue_core::{QueueSet, WorkerEvent, WorkerId};
use ractor::{Actor, ActorRef};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use crate::control::WorkerControl;
use crate::error::MachineError;
use crate::handler::JobHandlerRegistry;
use crate::messages::WorkerMessage;
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Where a worker is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Reserving,
    Executing,
    Suspended,
    Stopped,
}

/// Shared `alive` flag of a task. Starts out `true`.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    pub(crate) fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub(crate) fn guard(&self) -> AliveGuard {
        AliveGuard(self.clone())
    }

    pub fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Clears the liveness flag when dropped.
///
/// Held by the running actor, so the flag goes down however the actor ends.
#[derive(Debug)]
pub struct AliveGuard(Liveness);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::SeqCst);
    }
}

/// One polling loop bound to a queue set.
#[derive(Debug, Clone)]
pub struct Worker {
    id: WorkerId,
    queues: QueueSet,
    interval: Duration,
    control: WorkerControl,
    shutdown: Arc<AtomicBool>,
    state: Arc<watch::Sender<WorkerState>>,
}

impl Worker {
    pub fn new(queues: QueueSet, interval: Duration, control: WorkerControl) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            id: WorkerId::new(&queues),
            queues,
            interval,
            control,
            shutdown: Arc::new(AtomicBool::new(false)),
            state: Arc::new(state),
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.id
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// How long to suspend when no job is available.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Request shutdown of this worker only.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst) || self.control.is_shutdown_requested()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub(crate) fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    /// Resolves once the worker has reached `Stopped`.
    pub async fn stopped(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| *s == WorkerState::Stopped).await;
    }

    /// Resolves when a machine-wide shutdown is requested.
    pub(crate) fn interrupted(&self) -> impl Future<Output = ()> + Send + 'static {
        let control = self.control.clone();
        async move { control.shutdown_requested().await }
    }
}

/// A worker wrapped as a resumable cooperative task.
pub struct WorkerTask {
    worker: Worker,
    liveness: Liveness,
    guard: Option<AliveGuard>,
    actor: Option<ActorRef<WorkerMessage>>,
}

impl WorkerTask {
    pub fn new(worker: Worker) -> Self {
        let liveness = Liveness::new();
        Self {
            worker,
            guard: Some(liveness.guard()),
            liveness,
            actor: None,
        }
    }

    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    pub fn is_alive(&self) -> bool {
        self.liveness.is_alive()
    }

    /// The running actor, once resumed.
    pub fn actor(&self) -> Option<&ActorRef<WorkerMessage>> {
        self.actor.as_ref()
    }

    /// Spawn the worker's actor. A task can only be resumed once.
    pub async fn resume(
        &mut self,
        backend: Arc<dyn QueueBackend>,
        handlers: Arc<JobHandlerRegistry>,
        events: broadcast::Sender<WorkerEvent>,
    ) -> Result<JoinHandle<()>, MachineError> {
        let guard = self
            .guard
            .take()
            .ok_or_else(|| MachineError::AlreadyStarted(self.worker.id.to_string()))?;

        let args = WorkerArgs {
            worker: self.worker.clone(),
            backend,
            handlers,
            events,
            guard,
        };

        let (actor, handle) = Actor::spawn(None, WorkerActor, args).await?;
        self.actor = Some(actor);
        Ok(handle)
    }

    /// Ask this task's worker to stop after its current step.
    pub fn request_shutdown(&self) {
        self.worker.request_shutdown();
        if let Some(actor) = &self.actor {
            let _ = actor.send_message(WorkerMessage::Shutdown);
        }
    }
}
