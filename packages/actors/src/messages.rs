//! Message types for actor communication.

/// Messages for the WorkerActor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerMessage {
    /// Run one reserving step, executing the job if one is reserved.
    Poll,

    /// Stop at the next reserving step. Wakes a suspended worker.
    Shutdown,
}

/// Messages for the Monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorMessage {
    /// Periodic liveness check.
    Tick,
}
