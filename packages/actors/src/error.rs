use backend::BackendError;
use thiserror::Error;

/// Errors raised while building or running a `WorkerMachine`.
#[derive(Debug, Error)]
pub enum MachineError {
    #[error("Should have at least one fiber, got {0}")]
    InvalidFiberCount(usize),

    #[error("No queues configured")]
    NoQueues,

    #[error("Pidfile error: {0}")]
    Pidfile(#[source] std::io::Error),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    #[error("Worker {0} was already started")]
    AlreadyStarted(String),

    #[error("Failed to spawn actor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("Monitor task failed: {0}")]
    Monitor(#[from] tokio::task::JoinError),
}
