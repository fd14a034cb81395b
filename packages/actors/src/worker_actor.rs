//! Worker actor running the reserve/execute/suspend loop.
//!
//! Each `Poll` is one pass through the loop:
//!
//! ```text
//! RESERVING --job--> EXECUTING --> (next Poll)
//!     |
//!     +--none--> SUSPENDED --interval--> (next Poll)
//!     |             \--zero interval--> STOPPED
//!     +--shutdown--> STOPPED
//! ```
//!
//! An actor handles one message at a time, so a worker never reserves a
//! second job while the first one runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use backend::{BackendError, QueueBackend};
use chrono::Utc;
use queue_core::{Job, WorkerEvent};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::handler::JobHandlerRegistry;
use crate::messages::WorkerMessage;
use crate::suspend;
use crate::task::{AliveGuard, Worker, WorkerState};

/// State for the worker actor.
pub struct WorkerActorState {
    pub worker: Worker,
    pub backend: Arc<dyn QueueBackend>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub events: broadcast::Sender<WorkerEvent>,
    /// Job being processed. Only set within one step.
    pub current_job: Option<Job>,
    registered: bool,
    stopped: bool,
    _alive: AliveGuard,
}

impl WorkerActorState {
    fn emit(&self, event: WorkerEvent) {
        tracing::trace!("{}", event.description());
        let _ = self.events.send(event);
    }

    fn worker_id(&self) -> String {
        self.worker.id().to_string()
    }

    /// Deregister and announce the stop. Runs at most once.
    async fn finish(&mut self, reason: &str) {
        if self.stopped {
            return;
        }
        self.stopped = true;

        if self.registered {
            if let Err(e) = self.backend.deregister_worker(self.worker.id()).await {
                tracing::warn!("Failed to deregister worker {}: {}", self.worker.id(), e);
            }
            self.registered = false;
        }

        self.worker.set_state(WorkerState::Stopped);
        tracing::info!("Worker {} stopped: {}", self.worker.id(), reason);
        self.emit(WorkerEvent::WorkerStopped {
            worker_id: self.worker_id(),
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker: Worker,
    pub backend: Arc<dyn QueueBackend>,
    pub handlers: Arc<JobHandlerRegistry>,
    pub events: broadcast::Sender<WorkerEvent>,
    pub guard: AliveGuard,
}

/// What the loop does after a step.
#[derive(Debug, PartialEq)]
enum Next {
    Continue,
    Suspend { interval: Duration, paused: bool },
    Stop(&'static str),
}

/// Worker actor that executes jobs.
pub struct WorkerActor;

impl WorkerActor {
    async fn step(&self, state: &mut WorkerActorState) -> Result<Next, BackendError> {
        if !state.registered {
            state.backend.register_worker(state.worker.id()).await?;
            state.registered = true;

            tracing::info!(
                "Worker {} started, polling {}",
                state.worker.id(),
                state.worker.queues()
            );
            state.emit(WorkerEvent::WorkerStarted {
                worker_id: state.worker_id(),
                queues: state.worker.queues().to_string(),
                timestamp: Utc::now(),
            });
        }

        state.worker.set_state(WorkerState::Reserving);

        if state.worker.is_shutdown_requested() {
            return Ok(Next::Stop("shutdown requested"));
        }

        if state.worker.is_paused() {
            return Ok(idle(state.worker.interval(), true));
        }

        match state.backend.reserve(state.worker.queues()).await? {
            Some(job) => {
                self.execute(state, job).await?;
                Ok(Next::Continue)
            }
            None => Ok(idle(state.worker.interval(), false)),
        }
    }

    async fn execute(&self, state: &mut WorkerActorState, job: Job) -> Result<(), BackendError> {
        let id = state.worker.id().clone();
        state.worker.set_state(WorkerState::Executing);
        state.current_job = Some(job.clone());

        state.backend.mark_working(&id, &job).await?;
        tracing::info!("Worker {} processing {}", id, job);
        state.emit(WorkerEvent::JobStarted {
            worker_id: state.worker_id(),
            queue: job.queue.clone(),
            class: job.class().to_string(),
            timestamp: Utc::now(),
        });

        let started = Instant::now();
        let result = state.handlers.perform(&job).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(()) => {
                tracing::debug!("Worker {} done with {} in {}ms", id, job, duration_ms);
                state.emit(WorkerEvent::JobCompleted {
                    worker_id: state.worker_id(),
                    queue: job.queue.clone(),
                    class: job.class().to_string(),
                    duration_ms,
                    timestamp: Utc::now(),
                });
            }
            Err(error) => {
                tracing::warn!("Worker {} failed {}: {}", id, job, error);
                state.backend.record_failure(&id, &job, &error).await?;
                state.emit(WorkerEvent::JobFailed {
                    worker_id: state.worker_id(),
                    queue: job.queue.clone(),
                    class: job.class().to_string(),
                    error,
                    timestamp: Utc::now(),
                });
            }
        }

        state.backend.mark_done(&id, &job).await?;
        state.current_job = None;
        state.worker.set_state(WorkerState::Idle);
        Ok(())
    }
}

/// Nothing to do: suspend, or stop when the interval is zero.
fn idle(interval: Duration, paused: bool) -> Next {
    if interval.is_zero() {
        Next::Stop(if paused {
            "paused with zero interval"
        } else {
            "queues drained"
        })
    } else {
        Next::Suspend { interval, paused }
    }
}

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker.id());

        args.worker.set_state(WorkerState::Idle);
        myself.send_message(WorkerMessage::Poll)?;

        Ok(WorkerActorState {
            worker: args.worker,
            backend: args.backend,
            handlers: args.handlers,
            events: args.events,
            current_job: None,
            registered: false,
            stopped: false,
            _alive: args.guard,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if state.stopped {
            return Ok(());
        }

        if message == WorkerMessage::Shutdown {
            tracing::info!("Shutting down worker: {}", state.worker.id());
            state.worker.request_shutdown();
        }

        match self.step(state).await {
            Ok(Next::Continue) => {
                myself.send_message(WorkerMessage::Poll)?;
            }
            Ok(Next::Suspend { interval, paused }) => {
                state.worker.set_state(WorkerState::Suspended);
                tracing::debug!(
                    "Worker {} suspending for {:?}{}",
                    state.worker.id(),
                    interval,
                    if paused { " (paused)" } else { "" }
                );
                state.emit(WorkerEvent::WorkerSuspended {
                    worker_id: state.worker_id(),
                    interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
                    paused,
                    timestamp: Utc::now(),
                });
                suspend::wake_after(
                    myself.clone(),
                    interval,
                    WorkerMessage::Poll,
                    state.worker.interrupted(),
                );
            }
            Ok(Next::Stop(reason)) => {
                state.finish(reason).await;
                myself.stop(Some(reason.to_string()));
            }
            Err(e) => {
                tracing::error!("Worker {} failed: {}", state.worker.id(), e);
                state.finish(&format!("backend error: {}", e)).await;
                return Err(ActorProcessingErr::from(e));
            }
        }

        Ok(())
    }
}
