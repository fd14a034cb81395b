//! The worker machine: builds workers, runs them, and stops them.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use backend::BackendConfig;
use futures_util::future::join_all;
use queue_core::{QueueSet, WorkerEvent};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::control::WorkerControl;
use crate::error::MachineError;
use crate::handler::JobHandlerRegistry;
use crate::monitor::{DEFAULT_TICK, start_monitor};
use crate::pidfile::Pidfile;
use crate::signals;
use crate::task::{Worker, WorkerTask};

/// Machine configuration, fixed once the machine is built.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Number of concurrent workers. Must be at least one.
    pub fibers: usize,
    /// How long an idle worker suspends. Zero means exit when idle.
    pub interval: Duration,
    /// Queues every worker polls, in priority order.
    pub queues: QueueSet,
    /// Where to write the process id, if anywhere.
    pub pidfile: Option<PathBuf>,
    pub backend: BackendConfig,
    /// Time between monitor liveness checks.
    pub monitor_tick: Duration,
    pub verbose: bool,
    pub very_verbose: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            fibers: 1,
            interval: Duration::from_secs(5),
            queues: QueueSet::all(),
            pidfile: None,
            backend: BackendConfig::default(),
            monitor_tick: DEFAULT_TICK,
            verbose: false,
            very_verbose: false,
        }
    }
}

impl MachineConfig {
    pub fn with_fibers(mut self, fibers: usize) -> Self {
        self.fibers = fibers;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_queues(mut self, queues: QueueSet) -> Self {
        self.queues = queues;
        self
    }

    pub fn with_pidfile(mut self, pidfile: impl Into<PathBuf>) -> Self {
        self.pidfile = Some(pidfile.into());
        self
    }

    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_monitor_tick(mut self, tick: Duration) -> Self {
        self.monitor_tick = tick;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_very_verbose(mut self, very_verbose: bool) -> Self {
        self.very_verbose = very_verbose;
        self
    }
}

/// Cloneable handle for stopping or pausing a machine while it runs.
#[derive(Debug, Clone)]
pub struct MachineHandle {
    control: WorkerControl,
    pidfile: Option<Arc<Pidfile>>,
}

impl MachineHandle {
    /// Ask every worker to stop and remove the pidfile.
    ///
    /// Only flips flags and deletes a file, so it is safe to call from a
    /// signal listener. Repeated calls have no further effect.
    pub fn stop(&self) {
        if self.control.request_shutdown() {
            tracing::info!("Stopping workers");
        }

        if let Some(pidfile) = &self.pidfile
            && let Err(e) = pidfile.remove()
        {
            tracing::warn!("Failed to remove pidfile {:?}: {}", pidfile.path(), e);
        }
    }

    pub fn pause(&self) {
        tracing::info!("Pausing workers");
        self.control.pause();
    }

    pub fn resume(&self) {
        tracing::info!("Resuming workers");
        self.control.resume();
    }

    pub fn is_stopping(&self) -> bool {
        self.control.is_shutdown_requested()
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }
}

/// Builds `fibers` workers and runs them on the current runtime until all
/// of them have stopped.
pub struct WorkerMachine {
    config: MachineConfig,
    handle: MachineHandle,
    tasks: Vec<WorkerTask>,
    handlers: Arc<JobHandlerRegistry>,
    events: broadcast::Sender<WorkerEvent>,
}

impl WorkerMachine {
    /// Validate the config, build the workers, and write the pidfile.
    ///
    /// Nothing is written and no connection is made if validation fails.
    pub fn new(config: MachineConfig, handlers: JobHandlerRegistry) -> Result<Self, MachineError> {
        if config.fibers < 1 {
            return Err(MachineError::InvalidFiberCount(config.fibers));
        }
        if config.queues.names().is_empty() {
            return Err(MachineError::NoQueues);
        }

        let control = WorkerControl::new();
        let tasks = (0..config.fibers)
            .map(|_| {
                WorkerTask::new(Worker::new(
                    config.queues.clone(),
                    config.interval,
                    control.clone(),
                ))
            })
            .collect();

        let pidfile = config
            .pidfile
            .as_ref()
            .map(Pidfile::write)
            .transpose()
            .map_err(MachineError::Pidfile)?
            .map(Arc::new);

        let (events, _) = broadcast::channel(1024);

        tracing::debug!(
            "Built {} workers for queues {} (interval {:?})",
            config.fibers,
            config.queues,
            config.interval
        );

        Ok(Self {
            config,
            handle: MachineHandle { control, pidfile },
            tasks,
            handlers: Arc::new(handlers),
            events,
        })
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn workers(&self) -> impl Iterator<Item = &Worker> {
        self.tasks.iter().map(WorkerTask::worker)
    }

    pub fn tasks(&self) -> &[WorkerTask] {
        &self.tasks
    }

    pub fn handle(&self) -> MachineHandle {
        self.handle.clone()
    }

    /// Subscribe to worker events.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerEvent> {
        self.events.subscribe()
    }

    /// Run every worker until all of them have stopped.
    ///
    /// Connects the backend, prunes registrations left by dead processes,
    /// installs signal handlers, resumes the workers and then waits on the
    /// monitor.
    pub async fn start(&mut self) -> Result<(), MachineError> {
        let result = self.run().await;

        if let Some(pidfile) = &self.handle.pidfile
            && let Err(e) = pidfile.remove()
        {
            tracing::warn!("Failed to remove pidfile {:?}: {}", pidfile.path(), e);
        }

        result
    }

    /// Ask every worker to stop. See [`MachineHandle::stop`].
    pub fn stop(&self) {
        self.handle.stop();
    }

    async fn run(&mut self) -> Result<(), MachineError> {
        tracing::info!(
            "Starting {} workers on queues {}",
            self.tasks.len(),
            self.config.queues
        );

        let backend = self.config.backend.connect().await?;

        let pruned = backend.prune_dead_workers().await?;
        if !pruned.is_empty() {
            tracing::info!("Pruned {} dead workers", pruned.len());
        }

        let listener = signals::listen(self.handle())?;

        let mut workers = Vec::with_capacity(self.tasks.len());
        for task in &mut self.tasks {
            match task
                .resume(backend.clone(), self.handlers.clone(), self.events.clone())
                .await
            {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!("Failed to start worker {}: {}", task.worker().id(), e),
            }
        }

        let liveness = self.tasks.iter().map(WorkerTask::liveness).collect();
        let monitor = match start_monitor(liveness, self.config.monitor_tick).await {
            Ok((_, monitor)) => monitor,
            Err(e) => {
                tracing::error!("Failed to start monitor, stopping workers: {}", e);
                stop_and_join(&self.handle.control, workers).await;
                listener.abort();
                return Err(e.into());
            }
        };

        let result = monitor.await;
        listener.abort();
        tracing::info!("All workers stopped");

        result.map_err(MachineError::from)
    }
}

/// Request shutdown and wait until every started worker has finished.
async fn stop_and_join(control: &WorkerControl, workers: Vec<JoinHandle<()>>) {
    control.request_shutdown();
    for result in join_all(workers).await {
        if let Err(e) = result {
            tracing::warn!("Worker task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[test]
    fn defaults() {
        let config = MachineConfig::default();
        assert_eq!(config.fibers, 1);
        assert_eq!(config.interval, Duration::from_secs(5));
        assert!(config.queues.is_wildcard());
        assert_eq!(config.monitor_tick, Duration::from_secs(1));
        assert!(config.pidfile.is_none());
    }

    #[test]
    fn builds_one_worker_per_fiber() {
        let config = MachineConfig::default()
            .with_fibers(4)
            .with_queues(QueueSet::parse("high,low").unwrap())
            .with_backend(BackendConfig::Memory);
        let machine = WorkerMachine::new(config, JobHandlerRegistry::new()).unwrap();

        assert_eq!(machine.tasks().len(), 4);
        assert!(machine.tasks().iter().all(WorkerTask::is_alive));
        for worker in machine.workers() {
            assert_eq!(worker.queues().names(), ["high", "low"]);
        }
    }

    #[test]
    fn zero_fibers_is_rejected_before_pidfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");
        let config = MachineConfig::default().with_fibers(0).with_pidfile(&path);

        let err = WorkerMachine::new(config, JobHandlerRegistry::new())
            .err()
            .expect("config error");
        assert!(matches!(err, MachineError::InvalidFiberCount(0)));
        assert!(!path.exists());
    }

    #[test]
    fn stop_removes_pidfile_and_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.pid");
        let config = MachineConfig::default().with_pidfile(&path);
        let machine = WorkerMachine::new(config, JobHandlerRegistry::new()).unwrap();
        assert!(path.exists());

        let handle = machine.handle();
        handle.stop();
        assert!(!path.exists());
        assert!(handle.is_stopping());
        assert!(machine.workers().all(Worker::is_shutdown_requested));

        machine.stop();
        assert!(handle.is_stopping());
    }

    #[test]
    fn pause_and_resume_reach_workers() {
        let machine = WorkerMachine::new(MachineConfig::default(), JobHandlerRegistry::new()).unwrap();
        let handle = machine.handle();

        handle.pause();
        assert!(handle.is_paused());
        assert!(machine.workers().all(Worker::is_paused));

        handle.resume();
        assert!(!machine.workers().any(Worker::is_paused));
    }

    #[tokio::test]
    async fn stop_and_join_waits_for_suspended_workers() {
        let control = WorkerControl::new();
        let backend: Arc<dyn backend::QueueBackend> = Arc::new(backend::MemoryBackend::new());
        let handlers = Arc::new(JobHandlerRegistry::new());
        let (events, _) = broadcast::channel(16);

        let mut tasks: Vec<WorkerTask> = (0..2)
            .map(|_| {
                WorkerTask::new(Worker::new(
                    QueueSet::all(),
                    Duration::from_secs(60),
                    control.clone(),
                ))
            })
            .collect();
        let mut workers = Vec::new();
        for task in &mut tasks {
            workers.push(
                task.resume(backend.clone(), handlers.clone(), events.clone())
                    .await
                    .unwrap(),
            );
        }
        assert!(tasks.iter().all(WorkerTask::is_alive));

        tokio::time::timeout(Duration::from_secs(5), stop_and_join(&control, workers))
            .await
            .expect("workers stop");

        assert!(control.is_shutdown_requested());
        assert!(tasks.iter().all(|t| !t.is_alive()));
        assert!(tasks.iter().all(|t| t.worker().state() == crate::WorkerState::Stopped));
    }
}
